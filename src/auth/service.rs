use sqlx::PgPool;
use tracing::warn;

use crate::auth::repo::{self, Identity, User};

/// Outcome of credential verification. The three failure branches stay
/// distinguishable so callers can log which one fired; the login handler
/// collapses all of them into one generic message so the login page never
/// reveals whether an email is registered or an account is disabled.
#[derive(Debug)]
pub enum AuthOutcome {
    UnknownEmail,
    Inactive(User),
    WrongPassword(User),
    Authenticated(User),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthOutcome::UnknownEmail => None,
            AuthOutcome::Inactive(u)
            | AuthOutcome::WrongPassword(u)
            | AuthOutcome::Authenticated(u) => Some(u),
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn outcome_for(found: Option<User>, password: &str) -> AuthOutcome {
    let Some(user) = found else {
        return AuthOutcome::UnknownEmail;
    };
    if !user.is_active() {
        return AuthOutcome::Inactive(user);
    }
    // Case-sensitive comparison; check_password only trims whitespace.
    if user.check_password(password) {
        AuthOutcome::Authenticated(user)
    } else {
        AuthOutcome::WrongPassword(user)
    }
}

/// Verify credentials against a caller-supplied lookup, keeping persistence
/// out of the decision logic. The email is normalized (trim + lowercase)
/// before the lookup runs.
pub fn authenticate<F>(lookup: F, email: &str, password: &str) -> AuthOutcome
where
    F: FnOnce(&str) -> Option<User>,
{
    let email = normalize_email(email);
    outcome_for(lookup(&email), password)
}

/// The same decision over the user repository, for handler use.
pub async fn authenticate_by_email(
    db: &PgPool,
    email: &str,
    password: &str,
) -> sqlx::Result<AuthOutcome> {
    let email = normalize_email(email);
    let found = repo::find_by_email(db, &email).await?;
    let outcome = outcome_for(found, password);
    match &outcome {
        AuthOutcome::UnknownEmail => warn!(%email, "login attempt for unknown email"),
        AuthOutcome::Inactive(u) => warn!(user_id = u.id, "login attempt for inactive user"),
        AuthOutcome::WrongPassword(u) => warn!(user_id = u.id, "login attempt with wrong password"),
        AuthOutcome::Authenticated(_) => {}
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::test_user;

    fn lookup_one(user: User) -> impl FnOnce(&str) -> Option<User> {
        move |email: &str| (email == user.email).then_some(user)
    }

    #[test]
    fn authenticate_normalizes_email_case_and_whitespace() {
        let user = test_user(1, "ron.duplain@example.com", "secret", true);
        let outcome = authenticate(lookup_one(user), "  Ron.DuPlain@Example.COM ", "secret");
        assert!(outcome.is_authenticated());
    }

    #[test]
    fn authenticate_unknown_email_yields_no_user() {
        let outcome = authenticate(|_| None, "nobody@example.com", "secret");
        assert!(!outcome.is_authenticated());
        assert!(outcome.user().is_none());
        assert!(matches!(outcome, AuthOutcome::UnknownEmail));
    }

    #[test]
    fn authenticate_inactive_user_reveals_identity_but_fails() {
        let user = test_user(2, "gone@example.com", "secret", false);
        let outcome = authenticate(lookup_one(user), "gone@example.com", "secret");
        assert!(!outcome.is_authenticated());
        assert_eq!(outcome.user().map(|u| u.id), Some(2));
        assert!(matches!(outcome, AuthOutcome::Inactive(_)));
    }

    #[test]
    fn authenticate_wrong_password_fails_with_identity() {
        let user = test_user(3, "ron@example.com", "secret", true);
        let outcome = authenticate(lookup_one(user), "ron@example.com", "wrong");
        assert!(!outcome.is_authenticated());
        assert!(matches!(outcome, AuthOutcome::WrongPassword(_)));
    }

    #[test]
    fn authenticate_is_case_sensitive_on_password() {
        // The password is never lowercased before comparison; only
        // surrounding whitespace is forgiven.
        let user = test_user(4, "ron@example.com", "SeCrEt", true);
        let outcome = authenticate(lookup_one(user.clone()), "ron@example.com", "secret");
        assert!(!outcome.is_authenticated());

        let outcome = authenticate(lookup_one(user), "ron@example.com", " SeCrEt ");
        assert!(outcome.is_authenticated());
    }
}
