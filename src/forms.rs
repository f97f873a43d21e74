//! Shared form-validation plumbing: the per-field error map and the field
//! coercions (datetimes, checkboxes, optional text) both form sets use.

use std::collections::BTreeMap;

use serde::Serialize;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

/// Per-field validation errors, ordered by field name so re-rendered forms
/// annotate deterministically. Merged into the render context as-is.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

// Accepted submission shapes: HTML datetime-local with or without seconds,
// and the same with a space separator.
const DATETIME_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

pub fn parse_datetime(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| PrimitiveDateTime::parse(raw, fmt).ok())
}

/// Browsers submit checkboxes as "on" when ticked and omit them otherwise.
pub fn parse_checkbox(raw: Option<&str>) -> bool {
    matches!(
        raw.map(str::trim),
        Some("on") | Some("true") | Some("1")
    )
}

/// Trims the value and treats the empty string as "not provided", which is
/// how optional text inputs come in from HTML forms.
pub fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
