//! Landing data for each role.
//!
//! These sit behind the access gate. A signed-in user who opens another
//! role's dashboard is sent back to the login page, like an anonymous one.

use super::Session;
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::{Role, SessionUser, StaffRole};
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;

const ADMIN_ASSIGNMENTS: u32 = 100;
const DOCTOR_ASSIGNMENTS: u32 = 200;
const DOCTOR_NOTIFICATIONS: u32 = 50;
const DOCTOR_IMAGING_REPORTS: u32 = 200;
const ASSIGNEE_ASSIGNMENTS: u32 = 300;
const ASSIGNEE_NOTIFICATIONS: u32 = 200;
const PATIENT_NOTIFICATIONS: u32 = 50;

fn to_login() -> Response {
    Redirect::to("/login").into_response()
}

/// The session's user when it holds `role`.
fn holder(session: Session, role: Role) -> Option<SessionUser> {
    session.0.filter(|user| user.role == role)
}

pub async fn root(session: Session) -> Response {
    match session.0 {
        Some(user) => Redirect::to(&user.role.home_path()).into_response(),
        None => to_login(),
    }
}

pub async fn admin(State(state): State<AppState>, session: Session) -> Result<Response, ApiError> {
    let Some(user) = holder(session, Role::ADMIN) else {
        return Ok(to_login());
    };

    let body = state
        .blocking(move |db| {
            Ok(json!({
                "user": user,
                "staff": db.get_staff(user.id)?,
                "allStaff": db.get_all_staff()?,
                "allPatients": db.get_all_patients()?,
                "recentAssignments": db.recent_assignments(ADMIN_ASSIGNMENTS)?,
            }))
        })
        .await?;
    Ok(Json(body).into_response())
}

pub async fn doctor(State(state): State<AppState>, session: Session) -> Result<Response, ApiError> {
    let Some(user) = holder(session, Role::DOCTOR) else {
        return Ok(to_login());
    };

    let body = state
        .blocking(move |db| {
            Ok(json!({
                "user": user,
                "doctor": db.get_staff(user.id)?,
                "patients": db.get_all_patients()?,
                "nurses": db.get_available_staff(StaffRole::Nurse)?,
                "radiologists": db.get_available_staff(StaffRole::Radiologist)?,
                "assignments": db.assignments_by_doctor(user.id, DOCTOR_ASSIGNMENTS)?,
                "notifications": db.staff_notifications(user.id, DOCTOR_NOTIFICATIONS)?,
                "imagingReports": db.imaging_reports_for_doctor(user.id, DOCTOR_IMAGING_REPORTS)?,
            }))
        })
        .await?;
    Ok(Json(body).into_response())
}

/// Shared by the nurse and radiologist dashboards.
async fn assignee_dashboard(state: AppState, session: Session, role: Role) -> Result<Response, ApiError> {
    let Some(user) = holder(session, role) else {
        return Ok(to_login());
    };

    let body = state
        .blocking(move |db| {
            Ok(json!({
                "user": user,
                "staff": db.get_staff(user.id)?,
                "assignments": db.assignments_for_assignee(user.id, ASSIGNEE_ASSIGNMENTS)?,
                "notifications": db.staff_notifications(user.id, ASSIGNEE_NOTIFICATIONS)?,
            }))
        })
        .await?;
    Ok(Json(body).into_response())
}

pub async fn nurse(State(state): State<AppState>, session: Session) -> Result<Response, ApiError> {
    assignee_dashboard(state, session, Role::NURSE).await
}

pub async fn radiologist(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, ApiError> {
    assignee_dashboard(state, session, Role::RADIOLOGIST).await
}

pub async fn patient(State(state): State<AppState>, session: Session) -> Result<Response, ApiError> {
    let Some(user) = holder(session, Role::Patient) else {
        return Ok(to_login());
    };

    let body = state
        .blocking(move |db| {
            Ok(json!({
                "user": user,
                "history": db.patient_history(user.id)?,
                "notifications": db.patient_notifications(user.id, PATIENT_NOTIFICATIONS)?,
            }))
        })
        .await?;
    Ok(Json(body).into_response())
}
