//! Read-only lookups available to any signed-in user.

use super::Session;
use crate::app::AppState;
use crate::error::ApiError;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

const RECENT_ASSIGNMENTS: u32 = 100;

pub async fn patients(State(state): State<AppState>, session: Session) -> Result<Json<Value>, ApiError> {
    session.authenticated()?;
    let patients = state.blocking(|db| db.get_all_patients()).await?;
    Ok(Json(json!({ "patients": patients })))
}

pub async fn staff(State(state): State<AppState>, session: Session) -> Result<Json<Value>, ApiError> {
    session.authenticated()?;
    let staff = state.blocking(|db| db.get_all_staff()).await?;
    Ok(Json(json!({ "staff": staff })))
}

pub async fn assignments(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    session.authenticated()?;
    let assignments = state
        .blocking(|db| db.recent_assignments(RECENT_ASSIGNMENTS))
        .await?;
    Ok(Json(json!({ "assignments": assignments })))
}
