//! Orders, prescriptions, assignments and history lookups for doctors.
//!
//! Orders and assignments are only ever fetched together with the calling
//! doctor's id, so another doctor's record looks exactly like a missing one.

use super::{
    applied, check_acting_doctor, explicit_null, parse_id, path_id, present, JsonBody, RawId,
    Session,
};
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::{
    AssignmentChanges, AssignmentStatus, NewAssignment, NewOrder, OrderChanges, OrderStatus, Role,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

const ORDER_NOT_FOUND: &str = "Order not found or access denied";
const ASSIGNMENT_NOT_FOUND: &str = "Assignment not found or access denied";
const PATIENT_NOT_FOUND: &str = "Patient not found";

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    patient_id: Option<RawId>,
    doctor_id: Option<RawId>,
    order_type: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    order_type: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    notes: Option<Option<String>>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    order_id: Option<RawId>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrescriptionRequest {
    patient_id: Option<RawId>,
    doctor_id: Option<RawId>,
    medication: Option<String>,
    dosage: Option<String>,
    frequency: Option<String>,
    duration: Option<String>,
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    patient_id: Option<RawId>,
    doctor_id: Option<RawId>,
    assignee_staff_id: Option<RawId>,
    task_type: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssignmentRequest {
    task_type: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    notes: Option<Option<String>>,
    assignee_staff_id: Option<RawId>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "patientId")]
    patient_id: Option<String>,
}

fn order_status(status: Option<String>) -> Result<Option<OrderStatus>, ApiError> {
    present(status)
        .map(|s| s.parse().map_err(|_| ApiError::bad_request("Invalid status")))
        .transpose()
}

fn assignment_status(status: Option<String>) -> Result<Option<AssignmentStatus>, ApiError> {
    present(status)
        .map(|s| s.parse().map_err(|_| ApiError::bad_request("Invalid status")))
        .transpose()
}

/// Notes stored with a prescription, with defaults for anything left out.
fn prescription_notes(
    medication: &str,
    dosage: Option<&str>,
    frequency: Option<&str>,
    duration: Option<&str>,
    instructions: Option<&str>,
) -> String {
    format!(
        "Prescription Details:\n\
         Medication: {medication}\n\
         Dosage: {}\n\
         Frequency: {}\n\
         Duration: {}\n\
         Instructions: {}",
        dosage.unwrap_or("As prescribed"),
        frequency.unwrap_or("As directed"),
        duration.unwrap_or("As needed"),
        instructions.unwrap_or("Follow doctor's instructions"),
    )
}

pub async fn create_order(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<CreateOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;

    let (Some(patient_id), Some(order_type)) =
        (parse_id(body.patient_id.as_ref())?, present(body.order_type))
    else {
        return Err(ApiError::bad_request("Patient and order type are required"));
    };
    check_acting_doctor(body.doctor_id.as_ref(), &doctor)?;

    let new = NewOrder {
        patient_id,
        doctor_id: doctor.id,
        order_type,
        notes: present(body.notes),
        status: OrderStatus::Pending,
    };
    let outcome = state.blocking(move |db| db.create_order(&new)).await?;
    let order = applied(outcome, PATIENT_NOT_FOUND)?;

    tracing::info!(order_id = order.id, doctor_id = doctor.id, patient_id, "order created");
    Ok(Json(json!({ "success": true, "order": order })))
}

pub async fn update_order(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;
    let order_id = path_id(&id)?;

    let changes = OrderChanges {
        order_type: present(body.order_type),
        notes: body.notes,
        status: order_status(body.status)?,
    };
    let doctor_id = doctor.id;
    let outcome = state
        .blocking(move |db| db.update_order(order_id, doctor_id, &changes))
        .await?;
    let order = applied(outcome, ORDER_NOT_FOUND)?;

    Ok(Json(json!({ "success": true, "order": order })))
}

pub async fn delete_order(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;
    let order_id = path_id(&id)?;

    let doctor_id = doctor.id;
    let outcome = state
        .blocking(move |db| db.delete_order(order_id, doctor_id))
        .await?;
    applied(outcome, ORDER_NOT_FOUND)?;

    tracing::info!(order_id, doctor_id, "order deleted");
    Ok(Json(json!({ "success": true })))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<OrderStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;

    let (Some(order_id), Some(status)) = (parse_id(body.order_id.as_ref())?, present(body.status))
    else {
        return Err(ApiError::bad_request("Order ID and status are required"));
    };
    let status = status
        .parse::<OrderStatus>()
        .ok()
        .filter(OrderStatus::is_transition_target)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let changes = OrderChanges {
        status: Some(status),
        ..Default::default()
    };
    let doctor_id = doctor.id;
    let outcome = state
        .blocking(move |db| db.update_order(order_id, doctor_id, &changes))
        .await?;
    applied(outcome, ORDER_NOT_FOUND)?;

    Ok(Json(json!({ "success": true })))
}

pub async fn create_prescription(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<PrescriptionRequest>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;

    let (Some(patient_id), Some(medication)) =
        (parse_id(body.patient_id.as_ref())?, present(body.medication))
    else {
        return Err(ApiError::bad_request("Patient and medication are required"));
    };
    check_acting_doctor(body.doctor_id.as_ref(), &doctor)?;

    let notes = prescription_notes(
        &medication,
        present(body.dosage).as_deref(),
        present(body.frequency).as_deref(),
        present(body.duration).as_deref(),
        present(body.instructions).as_deref(),
    );
    let doctor_id = doctor.id;
    let outcome = state
        .blocking(move |db| db.create_prescription(patient_id, doctor_id, &medication, notes))
        .await?;
    let prescription = applied(outcome, PATIENT_NOT_FOUND)?;

    tracing::info!(order_id = prescription.id, doctor_id, patient_id, "prescription written");
    Ok(Json(json!({ "success": true, "prescription": prescription })))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<CreateAssignmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;

    let (Some(patient_id), Some(assignee_staff_id), Some(task_type)) = (
        parse_id(body.patient_id.as_ref())?,
        parse_id(body.assignee_staff_id.as_ref())?,
        present(body.task_type),
    ) else {
        return Err(ApiError::bad_request(
            "Patient, assignee, and task type are required",
        ));
    };
    check_acting_doctor(body.doctor_id.as_ref(), &doctor)?;

    let new = NewAssignment {
        patient_id,
        doctor_id: doctor.id,
        assignee_staff_id,
        task_type,
        notes: present(body.notes),
    };
    let outcome = state.blocking(move |db| db.create_assignment(&new)).await?;
    let assignment = applied(outcome, PATIENT_NOT_FOUND)?;

    Ok(Json(json!({ "success": true, "assignment": assignment })))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateAssignmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;
    let assignment_id = path_id(&id)?;

    let changes = AssignmentChanges {
        task_type: present(body.task_type),
        notes: body.notes,
        assignee_staff_id: parse_id(body.assignee_staff_id.as_ref())?,
        status: assignment_status(body.status)?,
    };
    let doctor_id = doctor.id;
    let outcome = state
        .blocking(move |db| db.update_assignment(assignment_id, doctor_id, &changes))
        .await?;
    let assignment = applied(outcome, ASSIGNMENT_NOT_FOUND)?;

    tracing::info!(assignment_id, doctor_id, "assignment updated");
    Ok(Json(json!({ "success": true, "assignment": assignment })))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let doctor = session.require(&[Role::DOCTOR])?;
    let assignment_id = path_id(&id)?;

    let doctor_id = doctor.id;
    let outcome = state
        .blocking(move |db| db.delete_assignment(assignment_id, doctor_id))
        .await?;
    applied(outcome, ASSIGNMENT_NOT_FOUND)?;

    tracing::info!(assignment_id, doctor_id, "assignment deleted");
    Ok(Json(json!({ "success": true })))
}

pub async fn patient_history(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    session.require(&[Role::DOCTOR])?;

    let patient_id = present(query.patient_id)
        .ok_or_else(|| ApiError::bad_request("Patient ID is required"))?;
    let patient_id = path_id(&patient_id)?;

    let history = state
        .blocking(move |db| db.patient_history(patient_id))
        .await?
        .ok_or_else(|| ApiError::not_found(PATIENT_NOT_FOUND))?;

    Ok(Json(json!(history)))
}
