//! Session store.
//!
//! A session is an opaque 64-character hex token carried in the `session_id`
//! cookie and backed by a row in the `sessions` table. Sessions live for a
//! fixed time and are never renewed.

use crate::db::Database;
use crate::models::{SessionUser, UserType};
use anyhow::Result;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use rand::rngs::OsRng;
use rand::RngCore;
use time::OffsetDateTime;

pub const SESSION_COOKIE: &str = "session_id";

const TOKEN_BYTES: usize = 32;

/// How session cookies are issued.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub ttl: time::Duration,
    /// Adds the `Secure` attribute to the cookie.
    pub secure: bool,
}

impl SessionSettings {
    /// `Set-Cookie` value that hands `token` to the browser.
    pub fn cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.ttl.whole_seconds()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    pub fn cleared_cookie(&self) -> String {
        let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// A fresh token from the operating system's CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Reads the session token from the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Persists a new session and returns its token.
pub fn create_session(
    db: &Database,
    settings: &SessionSettings,
    user_id: i64,
    user_type: UserType,
) -> Result<String> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + settings.ttl;
    db.insert_session(&token, user_id, user_type, expires_at)?;
    tracing::info!(user_id, user_type = user_type.as_str(), "session created");
    Ok(token)
}

/// Resolves a token to its user.
///
/// Missing, unknown and expired tokens all give `None`. So does any storage
/// error: authentication fails closed.
pub fn get_session(db: &Database, token: Option<&str>) -> Option<SessionUser> {
    let token = token?;
    match db.session_user(token, OffsetDateTime::now_utc()) {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!("session lookup failed, treating as signed out: {err:#}");
            None
        }
    }
}

/// Removes a session. Deleting an unknown token succeeds.
pub fn delete_session(db: &Database, token: &str) -> Result<()> {
    db.delete_session(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::models::{Role, StaffRole};
    use axum::http::HeaderValue;

    fn settings() -> SessionSettings {
        SessionSettings {
            ttl: time::Duration::days(7),
            secure: false,
        }
    }

    #[test]
    fn tokens_are_long_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hex::decode(&a).unwrap().len(), TOKEN_BYTES);
        assert_ne!(a, b);
    }

    #[test]
    fn cookie_is_http_only_for_seven_days() {
        let cookie = settings().cookie("abc");
        assert!(cookie.starts_with("session_id=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));

        let secure = SessionSettings { secure: true, ..settings() };
        assert!(secure.cleared_cookie().ends_with("Max-Age=0; Secure"));
    }

    #[test]
    fn token_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session_id=feed; lang=en"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("feed"));

        headers.insert(COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn created_session_resolves_until_deleted() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");

        let token = create_session(&db, &settings(), doctor.id, UserType::Staff).unwrap();
        let user = get_session(&db, Some(&token)).unwrap();
        assert_eq!(user.role, Role::DOCTOR);
        assert_eq!(user.email, "a@h.com");

        delete_session(&db, &token).unwrap();
        assert!(get_session(&db, Some(&token)).is_none());
        delete_session(&db, &token).unwrap();
    }

    #[test]
    fn expired_session_is_rejected() {
        let (_dir, db) = fresh_db();
        let pat = patient(&db, "Pat", "pat@h.com");
        let expired = SessionSettings {
            ttl: time::Duration::seconds(-60),
            secure: false,
        };

        let token = create_session(&db, &expired, pat.id, UserType::Patient).unwrap();
        assert!(get_session(&db, Some(&token)).is_none());
    }

    #[test]
    fn storage_errors_fail_closed() {
        let dir = tempfile::tempdir().unwrap();
        let uninitialized = Database::new(dir.path().join("blank.db"), std::time::Duration::from_secs(1));
        assert!(get_session(&uninitialized, Some("anything")).is_none());
        assert!(get_session(&uninitialized, None).is_none());
    }
}
