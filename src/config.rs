use serde::Deserialize;

/// Session-hijacking countermeasure level. Controls what happens when the
/// client fingerprint recorded at login no longer matches the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionProtection {
    /// Fingerprint mismatch invalidates the session.
    Strong,
    /// Fingerprint mismatch is logged but the session stays valid.
    Basic,
    /// Fingerprint is ignored entirely.
    None,
}

impl SessionProtection {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strong" => Some(Self::Strong),
            "basic" => Some(Self::Basic),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_minutes: i64,
    pub protection: SessionProtection,
    /// Marks every cookie `Secure`. On by default; switch off only for
    /// plain-http local development.
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
            protection: std::env::var("SESSION_PROTECTION")
                .ok()
                .and_then(|v| SessionProtection::parse(&v))
                .unwrap_or(SessionProtection::Strong),
            cookie_secure: std::env::var("SESSION_COOKIE_SECURE")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(true),
        };
        Ok(Self {
            database_url,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protection_parses_known_levels() {
        assert_eq!(
            SessionProtection::parse("strong"),
            Some(SessionProtection::Strong)
        );
        assert_eq!(
            SessionProtection::parse(" Basic "),
            Some(SessionProtection::Basic)
        );
        assert_eq!(
            SessionProtection::parse("NONE"),
            Some(SessionProtection::None)
        );
        assert_eq!(SessionProtection::parse("paranoid"), None);
    }
}
