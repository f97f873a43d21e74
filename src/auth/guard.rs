use crate::error::AppError;

/// A record that carries its owning user id. Ownership is the sole
/// authorization key for record-scoped operations.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

/// The record-scoped authorization check. Existence is decided before
/// ownership: a missing record is NotFound no matter who asks, and only an
/// existing record owned by someone else is Forbidden. Record ids are not
/// secrets, so the 403/404 distinction is a legitimate signal here.
pub fn authorize_owner<T: Owned>(found: Option<T>, caller_id: i64) -> Result<T, AppError> {
    let record = found.ok_or(AppError::NotFound)?;
    if record.owner_id() != caller_id {
        return Err(AppError::Forbidden);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Record {
        owner: i64,
    }

    impl Owned for Record {
        fn owner_id(&self) -> i64 {
            self.owner
        }
    }

    #[test]
    fn missing_record_is_not_found_for_everyone() {
        let err = authorize_owner::<Record>(None, 1).unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        // Even the would-be owner sees NotFound for a missing record.
        let err = authorize_owner::<Record>(None, 42).unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn foreign_record_is_forbidden() {
        let err = authorize_owner(Some(Record { owner: 1 }), 2).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn own_record_passes_through() {
        let record = authorize_owner(Some(Record { owner: 7 }), 7).unwrap();
        assert_eq!(record.owner, 7);
    }
}
