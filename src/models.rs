//! Data models for Wardline.
//!
//! Every row the service stores has a typed record here. Roles, user types and
//! statuses are closed enums whose text form is exactly what the database holds,
//! so they convert straight through `rusqlite`'s `ToSql`/`FromSql`.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when text does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Implements `Display`, `ToSql` and `FromSql` for an enum with `as_str` and `FromStr`.
macro_rules! text_enum {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ParseEnumError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// The role a staff member holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    Doctor,
    Nurse,
    Radiologist,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Doctor => "doctor",
            StaffRole::Nurse => "nurse",
            StaffRole::Radiologist => "radiologist",
        }
    }

    /// Whether a doctor may delegate assignments to this role.
    pub fn takes_assignments(&self) -> bool {
        match self {
            StaffRole::Nurse | StaffRole::Radiologist => true,
            StaffRole::Admin | StaffRole::Doctor => false,
        }
    }
}

impl FromStr for StaffRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(StaffRole::Admin),
            "doctor" => Ok(StaffRole::Doctor),
            "nurse" => Ok(StaffRole::Nurse),
            "radiologist" => Ok(StaffRole::Radiologist),
            other => Err(ParseEnumError::new("staff role", other)),
        }
    }
}

text_enum!(StaffRole);

/// The role of an authenticated caller. Patients are not staff, so they get
/// their own variant rather than a staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Patient,
    Staff(StaffRole),
}

impl Role {
    pub const ADMIN: Role = Role::Staff(StaffRole::Admin);
    pub const DOCTOR: Role = Role::Staff(StaffRole::Doctor);
    pub const NURSE: Role = Role::Staff(StaffRole::Nurse);
    pub const RADIOLOGIST: Role = Role::Staff(StaffRole::Radiologist);

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Staff(role) => role.as_str(),
        }
    }

    /// Path of the dashboard that belongs to this role.
    pub fn home_path(&self) -> String {
        format!("/{}", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Which table a session's `user_id` points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Patient,
    Staff,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Patient => "patient",
            UserType::Staff => "staff",
        }
    }
}

impl FromStr for UserType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(UserType::Patient),
            "staff" => Ok(UserType::Staff),
            other => Err(ParseEnumError::new("user type", other)),
        }
    }
}

text_enum!(UserType);

/// Lifecycle of a doctor's order or prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    /// Freshly written prescriptions.
    Active,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::InProgress => "In Progress",
            OrderStatus::Completed => "Completed",
            OrderStatus::Active => "Active",
        }
    }

    /// Statuses a doctor may move an order to through the status endpoint.
    pub fn is_transition_target(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "In Progress" => Ok(OrderStatus::InProgress),
            "Completed" => Ok(OrderStatus::Completed),
            "Active" => Ok(OrderStatus::Active),
            other => Err(ParseEnumError::new("order status", other)),
        }
    }
}

text_enum!(OrderStatus);

/// Lifecycle of a delegated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "Assigned",
            AssignmentStatus::InProgress => "In Progress",
            AssignmentStatus::Completed => "Completed",
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Assigned" => Ok(AssignmentStatus::Assigned),
            "In Progress" => Ok(AssignmentStatus::InProgress),
            "Completed" => Ok(AssignmentStatus::Completed),
            other => Err(ParseEnumError::new("assignment status", other)),
        }
    }
}

text_enum!(AssignmentStatus);

/// Represents a patient account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub created_at: String,
}

/// Fields needed to register a patient.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
}

/// Represents a staff member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffMember {
    pub id: i64,
    pub name: String,
    pub role: StaffRole,
    /// Specialty for doctors, department for everyone else.
    pub category: Option<String>,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub is_available: bool,
    pub created_at: String,
}

/// Fields an admin supplies when creating a staff member.
#[derive(Debug, Clone)]
pub struct NewStaffMember {
    pub name: String,
    pub role: StaffRole,
    pub category: Option<String>,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Represents an order a doctor placed for a patient.
///
/// Lab tests, imaging and other work share this table. Prescriptions are
/// orders too: their type reads `Prescription: <medication>` and their status
/// is `Active`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    /// The patient the order is for.
    pub patient_id: i64,
    /// The issuing doctor. Only this doctor may change or delete the order.
    pub doctor_id: i64,
    pub order_type: String,
    pub notes: Option<String>,
    pub status: OrderStatus,
    /// Creation time as written by SQLite (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub created_at: String,
}

/// Fields needed to place an order.
///
/// The caller picks the initial status: `Pending` for ordinary orders,
/// `Active` for prescriptions.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub order_type: String,
    pub notes: Option<String>,
    pub status: OrderStatus,
}

/// Partial update of an order; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub order_type: Option<String>,
    pub notes: Option<Option<String>>,
    pub status: Option<OrderStatus>,
}

/// An order joined with the issuing doctor.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithDoctor {
    #[serde(flatten)]
    pub order: Order,
    pub doctor_name: String,
    pub doctor_specialty: Option<String>,
}

/// Represents a task a doctor delegated to a nurse or radiologist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub patient_id: i64,
    /// The delegating doctor, who alone may edit or delete the assignment.
    pub doctor_id: i64,
    /// The nurse or radiologist doing the work, who alone may move its status.
    pub assignee_staff_id: i64,
    pub task_type: String,
    pub notes: Option<String>,
    pub status: AssignmentStatus,
    pub created_at: String,
}

/// Fields needed to delegate a task. New assignments always start out
/// `Assigned`.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub assignee_staff_id: i64,
    pub task_type: String,
    pub notes: Option<String>,
}

/// Partial update of an assignment; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct AssignmentChanges {
    pub task_type: Option<String>,
    pub notes: Option<Option<String>>,
    pub assignee_staff_id: Option<i64>,
    pub status: Option<AssignmentStatus>,
}

/// An assignment joined with the people involved. Each query fills in the
/// names it joins; the rest stay `None` and are omitted from JSON.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentDetail {
    #[serde(flatten)]
    pub assignment: Assignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_role: Option<StaffRole>,
}

/// A staff-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: i64,
    pub staff_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientNotification {
    pub id: i64,
    pub patient_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: i64,
    pub patient_id: i64,
    pub created_by_staff_id: i64,
    pub report_type: String,
    pub report_text: Option<String>,
    pub image_filename: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub patient_id: i64,
    pub created_by_staff_id: i64,
    pub report_type: String,
    pub report_text: String,
    pub image_filename: Option<String>,
}

/// A report joined with its author (and, on dashboards, the patient).
#[derive(Debug, Clone, Serialize)]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    pub staff_name: String,
    pub staff_role: StaffRole,
}

/// Everything recorded against one patient, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct PatientHistory {
    pub patient: Patient,
    pub prescriptions: Vec<OrderWithDoctor>,
    pub assignments: Vec<AssignmentDetail>,
    pub reports: Vec<ReportDetail>,
}

/// The normalized identity behind a valid session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(rename = "userType")]
    pub user_type: UserType,
}

impl SessionUser {
    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            email: patient.email.clone(),
            name: patient.name.clone(),
            role: Role::Patient,
            user_type: UserType::Patient,
        }
    }

    pub fn from_staff(staff: &StaffMember) -> Self {
        Self {
            id: staff.id,
            email: staff.email.clone(),
            name: staff.name.clone(),
            role: Role::Staff(staff.role),
            user_type: UserType::Staff,
        }
    }
}

/// Derives the login username from an email address (its local part).
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_use_spaced_text() {
        assert_eq!(AssignmentStatus::InProgress.as_str(), "In Progress");
        assert_eq!(
            "In Progress".parse::<OrderStatus>().unwrap(),
            OrderStatus::InProgress
        );
        assert_eq!(
            serde_json::to_value(AssignmentStatus::InProgress).unwrap(),
            "In Progress"
        );
        assert!("in progress".parse::<AssignmentStatus>().is_err());
    }

    #[test]
    fn only_nurses_and_radiologists_take_assignments() {
        assert!(StaffRole::Nurse.takes_assignments());
        assert!(StaffRole::Radiologist.takes_assignments());
        assert!(!StaffRole::Doctor.takes_assignments());
        assert!(!StaffRole::Admin.takes_assignments());
    }

    #[test]
    fn active_is_not_a_status_transition_target() {
        assert!(!OrderStatus::Active.is_transition_target());
        assert!(OrderStatus::Completed.is_transition_target());
    }

    #[test]
    fn role_serializes_as_plain_text() {
        assert_eq!(serde_json::to_value(Role::Patient).unwrap(), "patient");
        assert_eq!(serde_json::to_value(Role::RADIOLOGIST).unwrap(), "radiologist");
        assert_eq!(Role::DOCTOR.home_path(), "/doctor");
    }

    #[test]
    fn username_is_email_local_part() {
        assert_eq!(username_from_email("a@h.com"), "a");
        assert_eq!(username_from_email("no-at-sign"), "no-at-sign");
    }
}
