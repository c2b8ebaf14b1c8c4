//! Endpoints for nurses and radiologists.

use super::{applied, parse_id, path_id, present, JsonBody, RawId, Session};
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::{AssignmentStatus, NewReport, Role};
use crate::uploads::{UploadStore, INVALID_FILE_TYPE};
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

const ASSIGNEE_ROLES: [Role; 2] = [Role::NURSE, Role::RADIOLOGIST];

#[derive(Debug, Deserialize)]
pub struct AssignmentStatusRequest {
    assignment_id: Option<RawId>,
    status: Option<String>,
}

/// Fields of the report upload form.
#[derive(Debug, Default)]
struct ReportForm {
    patient_id: Option<String>,
    report_type: Option<String>,
    report_text: Option<String>,
    /// Original file name and contents. Empty parts are dropped.
    image: Option<(String, Bytes)>,
}

impl ReportForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ReportForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "patient_id" => form.patient_id = Some(field.text().await?),
                "report_type" => form.report_type = Some(field.text().await?),
                "report_text" => form.report_text = Some(field.text().await?),
                "image_file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.image = Some((file_name, bytes));
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

pub async fn update_assignment_status(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<AssignmentStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = session.require(&ASSIGNEE_ROLES)?;

    let (Some(assignment_id), Some(status)) =
        (parse_id(body.assignment_id.as_ref())?, present(body.status))
    else {
        return Err(ApiError::bad_request("Assignment ID and status are required"));
    };
    let status: AssignmentStatus = status
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid status"))?;

    let staff_id = user.id;
    let outcome = state
        .blocking(move |db| db.set_assignment_status(assignment_id, staff_id, status))
        .await?;
    applied(outcome, "Assignment not found or access denied")?;

    tracing::info!(assignment_id, staff_id, %status, "assignment status changed");
    Ok(Json(json!({ "success": true })))
}

pub async fn create_report(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let user = session.require(&ASSIGNEE_ROLES)?;
    let form = ReportForm::read(multipart).await?;

    let (Some(patient_id), Some(report_text)) = (present(form.patient_id), present(form.report_text))
    else {
        return Err(ApiError::bad_request("Patient and report text are required"));
    };
    let patient_id = path_id(&patient_id)?;
    let report_type = present(form.report_type).unwrap_or_else(|| "Report".to_string());

    if let Some((file_name, _)) = &form.image {
        if !UploadStore::is_allowed(file_name) {
            return Err(ApiError::bad_request(INVALID_FILE_TYPE));
        }
    }
    if state
        .blocking(move |db| db.get_patient(patient_id))
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Patient not found"));
    }

    let image_filename = match &form.image {
        Some((file_name, bytes)) => Some(state.uploads.save(file_name, bytes).await?),
        None => None,
    };

    let new = NewReport {
        patient_id,
        created_by_staff_id: user.id,
        report_type,
        report_text,
        image_filename: image_filename.clone(),
    };
    let stored = state
        .blocking(move |db| db.create_report(&new))
        .await
        .and_then(|outcome| applied(outcome, "Patient not found"));
    let report = match stored {
        Ok(report) => report,
        Err(err) => {
            if let Some(filename) = &image_filename {
                state.uploads.discard(filename).await;
            }
            return Err(err);
        }
    };

    tracing::info!(report_id = report.id, staff_id = user.id, patient_id, "report filed");
    Ok(Json(json!({ "success": true, "report": report })))
}
