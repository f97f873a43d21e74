//! Login-session lifecycle: a signed, stateless session token carried in an
//! HttpOnly cookie, validated on every request, with configurable protection
//! against session hijacking.

use std::time::Duration;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts, HeaderMap};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use crate::auth::repo::{self, Identity, User};
use crate::config::SessionProtection;
use crate::error::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sched_session";
pub const FLASH_COOKIE: &str = "sched_flash";

/// Notice flashed when an anonymous caller hits a protected page.
pub const LOGIN_NOTICE: &str = "Please log in to see your appointments.";

/// Claims inside the session token: the bound user id plus a fingerprint of
/// the client that logged in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: i64,
    pub iat: usize,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
}

/// Signing and verification keys for session tokens, derived from config.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    protection: SessionProtection,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let session = &state.config.session;
        Self::new(
            &session.secret,
            Duration::from_secs((session.ttl_minutes.max(1) as u64) * 60),
            session.protection,
        )
    }
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration, protection: SessionProtection) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            protection,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Bind a session to this user. Only called after authentication has
    /// succeeded. The fingerprint is recorded unless protection is off; an
    /// absent User-Agent is fingerprinted as the empty string so a later
    /// change of client signals (none to some) still invalidates.
    pub fn sign(&self, user_id: i64, user_agent: Option<&str>) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let ua = match self.protection {
            SessionProtection::None => None,
            _ => Some(ua_fingerprint(user_agent.unwrap_or(""))),
        };
        let claims = SessionClaims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            ua,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }

    /// Applies the protection policy: does the request's client fingerprint
    /// still match the one captured at login?
    pub fn client_matches(&self, claims: &SessionClaims, user_agent: Option<&str>) -> bool {
        let recorded = match (&self.protection, &claims.ua) {
            (SessionProtection::None, _) | (_, None) => return true,
            (_, Some(recorded)) => recorded,
        };
        if ua_fingerprint(user_agent.unwrap_or("")) == *recorded {
            return true;
        }
        match self.protection {
            SessionProtection::Strong => {
                warn!(user_id = claims.sub, "session client changed; invalidating");
                false
            }
            SessionProtection::Basic => {
                warn!(user_id = claims.sub, "session client changed; allowing");
                true
            }
            SessionProtection::None => true,
        }
    }
}

pub fn ua_fingerprint(user_agent: &str) -> String {
    let digest = Sha256::digest(user_agent.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// --- cookie plumbing ---

/// Pulls one cookie's value out of the Cookie header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

fn with_secure(mut cookie: String, secure: bool) -> String {
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    with_secure(
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            ttl.as_secs()
        ),
        secure,
    )
}

pub fn clear_session_cookie(secure: bool) -> String {
    with_secure(
        format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
        secure,
    )
}

/// One-shot notice for the next rendered page, percent-encoded to stay a
/// legal cookie value.
pub fn flash_cookie(message: &str, secure: bool) -> String {
    with_secure(
        format!(
            "{FLASH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            urlencode(message)
        ),
        secure,
    )
}

pub fn clear_flash_cookie(secure: bool) -> String {
    with_secure(
        format!("{FLASH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
        secure,
    )
}

/// Reads the pending flash message, if any. The rendering handler pairs this
/// with `clear_flash_cookie` so the notice shows exactly once.
pub fn take_flash(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, FLASH_COOKIE)
        .filter(|v| !v.is_empty())
        .map(|v| urldecode(&v))
}

pub fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

pub fn urldecode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            if let Some(byte) = raw
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(byte);
                i += 3;
                continue;
            }
            out.push(bytes[i]);
            i += 1;
        } else if bytes[i] == b'+' {
            out.push(b' ');
            i += 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

// --- request identity ---

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok())
}

/// Resolves the caller behind a request, or None when the session cookie is
/// absent, invalid, expired, failing the protection policy, or bound to an
/// id that no longer resolves to an active user.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = cookie_value(headers, SESSION_COOKIE)?;
    let keys = SessionKeys::from_ref(state);
    let claims = match keys.verify(&token) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "invalid session token");
            return None;
        }
    };
    if !keys.client_matches(&claims, user_agent(headers)) {
        return None;
    }
    let user = match repo::find_by_id(&state.db, claims.sub).await {
        Ok(found) => found?,
        Err(e) => {
            warn!(error = %e, user_id = claims.sub, "session user lookup failed");
            return None;
        }
    };
    if !user.is_active() || !user.is_authenticated() {
        return None;
    }
    Some(user)
}

/// Extractor for protected handlers. Rejection redirects to the login page
/// with the original destination preserved and the login notice flashed.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match current_user(state, &parts.headers).await {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(AppError::Unauthenticated {
                next: Some(
                    parts
                        .uri
                        .path_and_query()
                        .map(|pq| pq.as_str().to_string())
                        .unwrap_or_else(|| parts.uri.path().to_string()),
                ),
                secure: state.config.session.cookie_secure,
            }),
        }
    }
}
