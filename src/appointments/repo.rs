use sqlx::postgres::PgExecutor;
use sqlx::FromRow;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::auth::guard::Owned;

/// An appointment on the calendar. `user_id` is the sole authorization key
/// and never changes after creation.
#[derive(Debug, Clone, FromRow)]
pub struct Appointment {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    pub start_at: PrimitiveDateTime,
    pub end_at: Option<PrimitiveDateTime>,
    pub allday: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

impl Appointment {
    /// Length of the appointment in seconds. `None` when there is no end or
    /// the end precedes the start; the display layer shows nothing rather
    /// than a bogus zero.
    pub fn duration_seconds(&self) -> Option<i64> {
        let end = self.end_at?;
        let delta = (end - self.start_at).whole_seconds();
        (delta >= 0).then_some(delta)
    }
}

impl Owned for Appointment {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// Validated field values ready to persist, produced by the appointment
/// form validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentFields {
    pub title: Option<String>,
    pub start_at: PrimitiveDateTime,
    pub end_at: Option<PrimitiveDateTime>,
    pub allday: bool,
    pub location: Option<String>,
    pub description: Option<String>,
}

const COLUMNS: &str =
    "id, user_id, title, start_at, end_at, allday, location, description, created_at, modified_at";

/// All appointments owned by the user, soonest first.
pub async fn list_for_user<'e, E: PgExecutor<'e>>(
    db: E,
    user_id: i64,
) -> sqlx::Result<Vec<Appointment>> {
    sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {COLUMNS} FROM appointments WHERE user_id = $1 ORDER BY start_at ASC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Lookup by id with no ownership filter; authorization is the guard's
/// concern, not storage's.
pub async fn get_by_id<'e, E: PgExecutor<'e>>(db: E, id: i64) -> sqlx::Result<Option<Appointment>> {
    sqlx::query_as::<_, Appointment>(&format!("SELECT {COLUMNS} FROM appointments WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create<'e, E: PgExecutor<'e>>(
    db: E,
    user_id: i64,
    fields: &AppointmentFields,
) -> sqlx::Result<Appointment> {
    sqlx::query_as::<_, Appointment>(&format!(
        "INSERT INTO appointments (user_id, title, start_at, end_at, allday, location, description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(&fields.title)
    .bind(fields.start_at)
    .bind(fields.end_at)
    .bind(fields.allday)
    .bind(&fields.location)
    .bind(&fields.description)
    .fetch_one(db)
    .await
}

/// Applies validated fields and refreshes the modified timestamp. The owner
/// is deliberately not updatable.
pub async fn update<'e, E: PgExecutor<'e>>(
    db: E,
    id: i64,
    fields: &AppointmentFields,
) -> sqlx::Result<Appointment> {
    sqlx::query_as::<_, Appointment>(&format!(
        "UPDATE appointments \
         SET title = $2, start_at = $3, end_at = $4, allday = $5, location = $6, \
             description = $7, modified_at = now() \
         WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(&fields.title)
    .bind(fields.start_at)
    .bind(fields.end_at)
    .bind(fields.allday)
    .bind(&fields.location)
    .bind(&fields.description)
    .fetch_one(db)
    .await
}

pub async fn delete<'e, E: PgExecutor<'e>>(db: E, id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM appointments WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_appointment(
    id: i64,
    user_id: i64,
    start_at: PrimitiveDateTime,
    end_at: Option<PrimitiveDateTime>,
) -> Appointment {
    let now = OffsetDateTime::now_utc();
    Appointment {
        id,
        user_id,
        title: Some("Important Meeting".into()),
        start_at,
        end_at,
        allday: false,
        location: Some("The Office".into()),
        description: None,
        created_at: now,
        modified_at: now,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn duration_is_end_minus_start_in_seconds() {
        let appt = test_appointment(
            1,
            1,
            datetime!(2024-01-01 10:00),
            Some(datetime!(2024-01-01 11:00)),
        );
        assert_eq!(appt.duration_seconds(), Some(3600));
    }

    #[test]
    fn duration_spans_days() {
        let appt = test_appointment(
            1,
            1,
            datetime!(2024-01-01 10:00),
            Some(datetime!(2024-01-04 09:52:12)),
        );
        assert_eq!(appt.duration_seconds(), Some(258_732));
    }

    #[test]
    fn duration_is_undefined_without_an_end() {
        let appt = test_appointment(1, 1, datetime!(2024-01-01 10:00), None);
        assert_eq!(appt.duration_seconds(), None);
    }

    #[test]
    fn duration_is_undefined_when_end_precedes_start() {
        let appt = test_appointment(
            1,
            1,
            datetime!(2024-01-01 10:00),
            Some(datetime!(2024-01-01 09:00)),
        );
        assert_eq!(appt.duration_seconds(), None);
    }

    #[test]
    fn zero_length_appointment_has_zero_duration() {
        let appt = test_appointment(
            1,
            1,
            datetime!(2024-01-05 00:00),
            Some(datetime!(2024-01-05 00:00)),
        );
        assert_eq!(appt.duration_seconds(), Some(0));
    }

    #[test]
    fn owner_is_the_recorded_user_id() {
        let appt = test_appointment(1, 42, datetime!(2024-01-01 10:00), None);
        assert_eq!(appt.owner_id(), 42);
    }
}
