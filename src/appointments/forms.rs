use serde::Deserialize;

use crate::appointments::repo::{Appointment, AppointmentFields};
use crate::filters::format_input;
use crate::forms::{non_empty, parse_checkbox, parse_datetime, FormErrors};

const MAX_TEXT: usize = 255;

/// Raw appointment form submission, exactly as the browser sent it. Also
/// used to re-render the form with the user's input intact after a
/// validation failure.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AppointmentForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub allday: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
}

impl AppointmentForm {
    /// Prefill from an existing record for the edit page.
    pub fn from_appointment(appt: &Appointment) -> Self {
        Self {
            title: appt.title.clone().unwrap_or_default(),
            start: format_input(appt.start_at),
            end: appt.end_at.map(format_input).unwrap_or_default(),
            allday: appt.allday.then(|| "on".to_string()),
            location: appt.location.clone().unwrap_or_default(),
            description: appt.description.clone().unwrap_or_default(),
        }
    }

    /// Validate and coerce into persistable fields. Reports every problem at
    /// once; never touches persistence.
    pub fn validate(&self) -> Result<AppointmentFields, FormErrors> {
        let mut errors = FormErrors::new();

        let title = non_empty(&self.title);
        if let Some(title) = &title {
            if title.chars().count() > MAX_TEXT {
                errors.add("title", "Field cannot be longer than 255 characters.");
            }
        }

        let start_at = match self.start.trim() {
            "" => {
                errors.add("start", "This field is required.");
                None
            }
            raw => match parse_datetime(raw) {
                Some(dt) => Some(dt),
                None => {
                    errors.add("start", "Not a valid datetime value.");
                    None
                }
            },
        };

        let end_at = match self.end.trim() {
            "" => None,
            raw => match parse_datetime(raw) {
                Some(dt) => Some(dt),
                None => {
                    errors.add("end", "Not a valid datetime value.");
                    None
                }
            },
        };

        let location = non_empty(&self.location);
        if let Some(location) = &location {
            if location.chars().count() > MAX_TEXT {
                errors.add("location", "Field cannot be longer than 255 characters.");
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(AppointmentFields {
            title,
            start_at: start_at.expect("start validated above"),
            end_at,
            allday: parse_checkbox(self.allday.as_deref()),
            location,
            description: non_empty(&self.description),
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::appointments::repo::test_appointment;

    fn filled_form() -> AppointmentForm {
        AppointmentForm {
            title: "Important Meeting".into(),
            start: "2024-01-01T10:00".into(),
            end: "2024-01-01T11:00".into(),
            allday: None,
            location: "The Office".into(),
            description: "Budget review.\nBring slides.".into(),
        }
    }

    #[test]
    fn valid_form_coerces_every_field() {
        let fields = filled_form().validate().unwrap();
        assert_eq!(fields.title.as_deref(), Some("Important Meeting"));
        assert_eq!(fields.start_at, datetime!(2024-01-01 10:00));
        assert_eq!(fields.end_at, Some(datetime!(2024-01-01 11:00)));
        assert!(!fields.allday);
        assert_eq!(fields.location.as_deref(), Some("The Office"));
        assert_eq!(
            fields.description.as_deref(),
            Some("Budget review.\nBring slides.")
        );
    }

    #[test]
    fn title_and_end_are_optional() {
        let mut form = filled_form();
        form.title = "".into();
        form.end = "".into();
        let fields = form.validate().unwrap();
        assert_eq!(fields.title, None);
        assert_eq!(fields.end_at, None);
    }

    #[test]
    fn start_is_required() {
        let mut form = filled_form();
        form.start = "  ".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field("start"), ["This field is required."]);
    }

    #[test]
    fn unparseable_datetimes_are_field_errors() {
        let mut form = filled_form();
        form.start = "next tuesday".into();
        form.end = "2024-01-99T10:00".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field("start"), ["Not a valid datetime value."]);
        assert_eq!(errors.field("end"), ["Not a valid datetime value."]);
    }

    #[test]
    fn overlong_title_is_rejected() {
        let mut form = filled_form();
        form.title = "x".repeat(256);
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.field("title"),
            ["Field cannot be longer than 255 characters."]
        );

        // 255 characters is still fine.
        let mut form = filled_form();
        form.title = "x".repeat(255);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn overlong_location_is_rejected() {
        let mut form = filled_form();
        form.location = "y".repeat(256);
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.field("location"),
            ["Field cannot be longer than 255 characters."]
        );
    }

    #[test]
    fn allday_checkbox_round_trips() {
        let mut form = filled_form();
        form.allday = Some("on".into());
        assert!(form.validate().unwrap().allday);

        let appt = test_appointment(1, 1, datetime!(2024-01-05 00:00), None);
        let mut allday_appt = appt.clone();
        allday_appt.allday = true;
        assert_eq!(
            AppointmentForm::from_appointment(&allday_appt).allday.as_deref(),
            Some("on")
        );
        assert_eq!(AppointmentForm::from_appointment(&appt).allday, None);
    }

    #[test]
    fn prefill_formats_datetimes_for_inputs() {
        let appt = test_appointment(
            1,
            1,
            datetime!(2024-01-01 10:00),
            Some(datetime!(2024-01-01 11:30)),
        );
        let form = AppointmentForm::from_appointment(&appt);
        assert_eq!(form.start, "2024-01-01T10:00");
        assert_eq!(form.end, "2024-01-01T11:30");
        assert_eq!(form.title, "Important Meeting");
    }
}
