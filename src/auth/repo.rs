use sqlx::postgres::PgExecutor;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::password::{hash_password, verify_password};

/// A user login, with credentials and authentication.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    /// Argon2 PHC string; the plaintext is never stored.
    pub password_hash: Option<String>,
    pub active: bool,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

/// What the session layer is allowed to know about a logged-in principal.
/// Implemented by `User`, but the session code never depends on the entity
/// beyond this surface.
pub trait Identity {
    fn id(&self) -> i64;
    fn is_active(&self) -> bool;
    fn is_authenticated(&self) -> bool;
}

impl Identity for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_authenticated(&self) -> bool {
        true
    }
}

impl User {
    /// Replaces the stored hash with one derived from the trimmed plaintext.
    /// The caller persists the change; this only mutates the record.
    pub fn set_password(&mut self, plain: &str) -> anyhow::Result<()> {
        self.password_hash = Some(hash_password(plain.trim())?);
        Ok(())
    }

    /// True only when a hash is stored, the trimmed input is non-empty, and
    /// the hash verifies. Never errors outward: a malformed stored hash
    /// counts as a failed check.
    pub fn check_password(&self, plain: &str) -> bool {
        let Some(hash) = self.password_hash.as_deref() else {
            return false;
        };
        let plain = plain.trim();
        if plain.is_empty() {
            return false;
        }
        verify_password(plain, hash).unwrap_or(false)
    }
}

/// Find a user by email. The caller normalizes (trim + lowercase) first;
/// stored emails are already lowercased.
pub async fn find_by_email<'e, E: PgExecutor<'e>>(
    db: E,
    email: &str,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password_hash, active, created_at, modified_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(db: E, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password_hash, active, created_at, modified_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Insert a new user. Email uniqueness is enforced by the database; a
/// duplicate surfaces as a unique-violation error, never an overwrite.
pub async fn create<'e, E: PgExecutor<'e>>(
    db: E,
    name: Option<&str>,
    email: &str,
    password_hash: &str,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id, name, email, password_hash, active, created_at, modified_at
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(db)
    .await
}

#[cfg(test)]
pub(crate) fn test_user(id: i64, email: &str, password: &str, active: bool) -> User {
    let now = OffsetDateTime::now_utc();
    let mut user = User {
        id,
        name: None,
        email: email.to_string(),
        password_hash: None,
        active,
        created_at: now,
        modified_at: now,
    };
    user.set_password(password).expect("hashing should succeed");
    user
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_password_stores_hash_not_plaintext() {
        let mut user = test_user(1, "ron@example.com", "placeholder", true);
        user.set_password("secret").unwrap();
        let hash = user.password_hash.clone().unwrap();
        assert_ne!(hash, "secret");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn check_password_trims_surrounding_whitespace() {
        let user = test_user(1, "ron@example.com", "  secret  ", true);
        // set_password trimmed before hashing, so both shapes verify.
        assert!(user.check_password("secret"));
        assert!(user.check_password("  secret  "));
        assert!(!user.check_password("Secret"));
    }

    #[test]
    fn check_password_rejects_missing_hash_and_empty_input() {
        let mut user = test_user(1, "ron@example.com", "secret", true);
        assert!(!user.check_password(""));
        assert!(!user.check_password("   "));

        user.password_hash = None;
        assert!(!user.check_password("secret"));
    }

    #[test]
    fn check_password_swallows_malformed_hash() {
        let mut user = test_user(1, "ron@example.com", "secret", true);
        user.password_hash = Some("not-a-valid-hash".into());
        assert!(!user.check_password("secret"));
    }

    #[test]
    fn identity_surface_reflects_active_flag() {
        let mut user = test_user(7, "ron@example.com", "secret", true);
        assert_eq!(Identity::id(&user), 7);
        assert!(user.is_active());
        assert!(user.is_authenticated());

        user.active = false;
        assert!(!user.is_active());
    }
}
