//! HTTP handlers, one module per audience.
//!
//! Every handler follows the same order: resolve the session, check the
//! role, validate the body, then hand the write to the storage layer.

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod data;
pub mod doctor;
pub mod staff;

use crate::app::AppState;
use crate::db::WriteOutcome;
use crate::error::ApiError;
use crate::models::{Role, SessionUser};
use crate::session::{self, token_from_headers};
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// JSON request body whose parse failures use the API's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// The caller's session, if the cookie names a live one.
#[derive(Debug, Clone)]
pub struct Session(pub Option<SessionUser>);

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers);
        let db = state.db.clone();
        let user =
            tokio::task::spawn_blocking(move || session::get_session(&db, token.as_deref())).await?;
        Ok(Session(user))
    }
}

impl Session {
    /// Any signed-in user.
    pub fn authenticated(self) -> Result<SessionUser, ApiError> {
        self.0
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
    }

    /// A signed-in user holding one of `roles`.
    pub fn require(self, roles: &[Role]) -> Result<SessionUser, ApiError> {
        match self.0 {
            Some(user) if roles.contains(&user.role) => Ok(user),
            Some(user) => {
                tracing::warn!(user_id = user.id, role = %user.role, "role not allowed here");
                Err(ApiError::unauthorized())
            }
            None => Err(ApiError::unauthorized()),
        }
    }
}

/// An ID as clients send it: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawId(Value);

impl RawId {
    /// `Ok(None)` for an empty string, which callers treat as missing.
    pub fn parse(&self) -> Result<Option<i64>, ApiError> {
        let id = match &self.0 {
            Value::Number(n) => n.as_i64(),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        match id {
            Some(id) if id > 0 => Ok(Some(id)),
            _ => Err(ApiError::bad_request("Invalid ID format")),
        }
    }
}

/// Parses an optional ID field.
pub fn parse_id(raw: Option<&RawId>) -> Result<Option<i64>, ApiError> {
    match raw {
        Some(raw) => raw.parse(),
        None => Ok(None),
    }
}

/// Parses a path segment ID.
pub fn path_id(segment: &str) -> Result<i64, ApiError> {
    match segment.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::bad_request("Invalid ID format")),
    }
}

/// Treats empty strings like absent fields.
pub fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

/// Deserializes a field that may be absent, `null`, or set, keeping the
/// difference between the first two: absent is `None`, `null` is `Some(None)`.
/// Use together with `#[serde(default)]`.
pub fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A `doctor_id` in the body, when given, has to be the caller.
pub fn check_acting_doctor(raw: Option<&RawId>, user: &SessionUser) -> Result<(), ApiError> {
    match parse_id(raw)? {
        Some(doctor_id) if doctor_id != user.id => {
            tracing::warn!(user_id = user.id, doctor_id, "doctor_id does not match session");
            Err(ApiError::unauthorized())
        }
        _ => Ok(()),
    }
}

/// Maps a storage outcome onto the HTTP error taxonomy.
pub fn applied<T>(outcome: WriteOutcome<T>, not_found: &str) -> Result<T, ApiError> {
    match outcome {
        WriteOutcome::Applied(value) => Ok(value),
        WriteOutcome::NotFound => Err(ApiError::not_found(not_found)),
        WriteOutcome::Rejected(reason) => Err(ApiError::bad_request(reason)),
    }
}
