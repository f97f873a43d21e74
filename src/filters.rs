//! Formatting helpers used when building template contexts: humanized
//! durations, date/datetime display, and newline-to-<br /> conversion.

use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::render::escape_html;

/// "2024-01-01 - Monday at 10:00am" style display for list/detail pages.
pub fn format_datetime(dt: PrimitiveDateTime) -> String {
    let date = dt
        .format(format_description!("[year]-[month]-[day] - [weekday repr:long]"))
        .unwrap_or_default();
    let clock = dt
        .format(format_description!(
            "[hour repr:12 padding:none]:[minute][period case:lower]"
        ))
        .unwrap_or_default();
    format!("{date} at {clock}")
}

/// Date-only display, for all-day appointments.
pub fn format_date(dt: PrimitiveDateTime) -> String {
    dt.format(format_description!("[year]-[month]-[day] - [weekday repr:long]"))
        .unwrap_or_default()
}

/// Value for a datetime-local form input when prefilling the edit form.
pub fn format_input(dt: PrimitiveDateTime) -> String {
    dt.format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .unwrap_or_default()
}

/// Humanized duration: 3600 becomes "1 hour", 258732 becomes
/// "2 days, 23 hours, 52 minutes, 12 seconds".
pub fn humanize_duration(seconds: i64) -> String {
    let (m, s) = (seconds / 60, seconds % 60);
    let (h, m) = (m / 60, m % 60);
    let (d, h) = (h / 24, h % 24);

    let mut tokens = Vec::new();
    for (value, unit) in [(d, "day"), (h, "hour"), (m, "minute"), (s, "second")] {
        if value > 1 {
            tokens.push(format!("{value} {unit}s"));
        } else if value == 1 {
            tokens.push(format!("1 {unit}"));
        }
    }
    tokens.join(", ")
}

/// Escapes HTML and renders newlines as <br /> so descriptions entered in a
/// textarea keep their line breaks on display.
pub fn nl2br(value: &str) -> String {
    escape_html(value)
        .split('\n')
        .collect::<Vec<_>>()
        .join("<br />")
}
