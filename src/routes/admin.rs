use super::{applied, path_id, present, JsonBody, Session};
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::{NewPatient, NewStaffMember, Role, StaffRole};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    name: Option<String>,
    role: Option<String>,
    category: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    dob: Option<String>,
    gender: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    is_available: Option<bool>,
}

pub async fn create_staff(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<CreateStaffRequest>,
) -> Result<Json<Value>, ApiError> {
    let admin = session.require(&[Role::ADMIN])?;

    let (Some(name), Some(role), Some(email), Some(password)) = (
        present(body.name),
        present(body.role),
        present(body.email),
        present(body.password),
    ) else {
        return Err(ApiError::bad_request(
            "Name, role, email, and password are required",
        ));
    };
    let role: StaffRole = role
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid role"))?;

    let new = NewStaffMember {
        name,
        role,
        category: present(body.category),
        email,
        password,
        phone: present(body.phone),
    };
    let cost = state.bcrypt_cost;
    let outcome = state
        .blocking(move |db| db.create_staff_member(&new, cost))
        .await?;
    let staff = applied(outcome, "Staff member not found")?;

    tracing::info!(admin_id = admin.id, staff_id = staff.id, role = %staff.role, "staff member created");
    Ok(Json(json!({ "success": true, "staff": staff })))
}

pub async fn create_patient(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<CreatePatientRequest>,
) -> Result<Json<Value>, ApiError> {
    let admin = session.require(&[Role::ADMIN])?;

    let (Some(name), Some(email), Some(password)) = (
        present(body.name),
        present(body.email),
        present(body.password),
    ) else {
        return Err(ApiError::bad_request(
            "Name, email, and password are required",
        ));
    };

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
    let patient = applied(outcome, "Patient not found")?;

    tracing::info!(admin_id = admin.id, patient_id = patient.id, "patient created by admin");
    Ok(Json(json!({ "success": true, "patient": patient })))
}

/// Takes a nurse or radiologist off (or back onto) the assignable roster.
pub async fn set_availability(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AvailabilityRequest>,
) -> Result<Json<Value>, ApiError> {
    session.require(&[Role::ADMIN])?;
    let staff_id = path_id(&id)?;
    let available = body
        .is_available
        .ok_or_else(|| ApiError::bad_request("Availability is required"))?;

    let changed = state
        .blocking(move |db| db.set_staff_availability(staff_id, available))
        .await?;
    if !changed {
        return Err(ApiError::not_found("Staff member not found"));
    }

    tracing::info!(staff_id, available, "staff availability changed");
    Ok(Json(json!({ "success": true })))
}
