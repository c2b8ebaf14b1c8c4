use super::{present, JsonBody, Session};
use crate::app::AppState;
use crate::auth::{self, Credentials};
use crate::error::ApiError;
use crate::models::{NewPatient, SessionUser};
use crate::session::{self, token_from_headers};
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or username.
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    role: Option<String>,
    phone: Option<String>,
    dob: Option<String>,
    gender: Option<String>,
}

/// Opens a session for `user` and builds the response that hands it over.
async fn start_session(state: &AppState, user: SessionUser) -> Result<impl IntoResponse, ApiError> {
    let settings = state.sessions;
    let (user_id, user_type) = (user.id, user.user_type);
    let token = state
        .blocking(move |db| session::create_session(db, &settings, user_id, user_type))
        .await?;

    let cookie = settings.cookie(&token);
    let body = json!({
        "success": true,
        "redirect": user.role.home_path(),
        "user": user,
        "sessionId": token,
    });
    Ok(([(SET_COOKIE, cookie)], Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(identifier), Some(password)) = (present(body.email), present(body.password)) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let credentials = Credentials {
        identifier,
        password,
    };
    let attempted = credentials.identifier.clone();
    let user = state
        .blocking(move |db| auth::login(db, &credentials))
        .await?
        .ok_or_else(|| {
            tracing::warn!(identifier = %attempted, "failed login");
            ApiError::Unauthorized("Invalid credentials".to_string())
        })?;

    tracing::info!(user_id = user.id, role = %user.role, "login");
    start_session(&state, user).await
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password), Some(name)) = (
        present(body.email),
        present(body.password),
        present(body.name),
    ) else {
        return Err(ApiError::bad_request("Email, password, and name are required"));
    };
    if body.role.as_deref() != Some("patient") {
        return Err(ApiError::bad_request("Only patient registration is allowed"));
    }

    let new = NewPatient {
        name,
        email,
        password,
        phone: present(body.phone),
        dob: present(body.dob),
        gender: present(body.gender),
    };
    let cost = state.bcrypt_cost;
    let outcome = state.blocking(move |db| db.create_patient(&new, cost)).await?;
    let patient = super::applied(outcome, "Patient not found")?;

    tracing::info!(patient_id = patient.id, "patient registered");
    start_session(&state, SessionUser::from_patient(&patient)).await
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = token_from_headers(&headers) {
        state
            .blocking(move |db| session::delete_session(db, &token))
            .await?;
    }
    Ok((
        [(SET_COOKIE, state.sessions.cleared_cookie())],
        Json(json!({ "success": true })),
    ))
}

pub async fn me(session: Session) -> Result<Json<serde_json::Value>, ApiError> {
    let user = session.authenticated()?;
    Ok(Json(json!({ "user": user })))
}
