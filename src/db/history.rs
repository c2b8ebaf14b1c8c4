//! Read-side joins: patient history and the listings dashboards show.

use super::assignments::assignment_from_row;
use super::orders::order_from_row;
use super::reports::report_from_row;
use super::{query_patient, Database};
use crate::models::{AssignmentDetail, OrderWithDoctor, PatientHistory, ReportDetail};
use anyhow::Result;
use rusqlite::{params, Connection};

/// Upper bound on each list in a patient's history.
const HISTORY_ROW_CAP: u32 = 300;

const A: &str = "a.id, a.patient_id, a.doctor_id, a.assignee_staff_id, a.task_type, a.notes, a.status, a.created_at";
const O: &str = "o.id, o.patient_id, o.doctor_id, o.order_type, o.notes, o.status, o.created_at";
const R: &str = "r.id, r.patient_id, r.created_by_staff_id, r.report_type, r.report_text, r.image_filename, r.created_at";

fn orders_for_patient(conn: &Connection, patient_id: i64) -> Result<Vec<OrderWithDoctor>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {O}, d.name, d.category
         FROM orders o
         JOIN staff d ON d.id = o.doctor_id
         WHERE o.patient_id = ?
         ORDER BY o.id DESC
         LIMIT ?"
    ))?;
    let rows = stmt
        .query_map(params![patient_id, HISTORY_ROW_CAP], |row| {
            Ok(OrderWithDoctor {
                order: order_from_row(row)?,
                doctor_name: row.get(7)?,
                doctor_specialty: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn assignments_for_patient(conn: &Connection, patient_id: i64) -> Result<Vec<AssignmentDetail>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {A}, d.name, s.name, s.role
         FROM assignments a
         JOIN staff d ON d.id = a.doctor_id
         JOIN staff s ON s.id = a.assignee_staff_id
         WHERE a.patient_id = ?
         ORDER BY a.id DESC
         LIMIT ?"
    ))?;
    let rows = stmt
        .query_map(params![patient_id, HISTORY_ROW_CAP], |row| {
            Ok(AssignmentDetail {
                assignment: assignment_from_row(row)?,
                patient_name: None,
                doctor_name: Some(row.get(8)?),
                assignee_name: Some(row.get(9)?),
                assignee_role: Some(row.get(10)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn reports_for_patient(conn: &Connection, patient_id: i64) -> Result<Vec<ReportDetail>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {R}, s.name, s.role
         FROM reports r
         JOIN staff s ON s.id = r.created_by_staff_id
         WHERE r.patient_id = ?
         ORDER BY r.id DESC
         LIMIT ?"
    ))?;
    let rows = stmt
        .query_map(params![patient_id, HISTORY_ROW_CAP], |row| {
            Ok(ReportDetail {
                report: report_from_row(row)?,
                patient_name: None,
                staff_name: row.get(7)?,
                staff_role: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    /// Everything recorded against a patient, or `None` for an unknown id.
    pub fn patient_history(&self, patient_id: i64) -> Result<Option<PatientHistory>> {
        let conn = self.connect()?;
        let Some(patient) = query_patient(&conn, patient_id)? else {
            return Ok(None);
        };

        Ok(Some(PatientHistory {
            prescriptions: orders_for_patient(&conn, patient_id)?,
            assignments: assignments_for_patient(&conn, patient_id)?,
            reports: reports_for_patient(&conn, patient_id)?,
            patient,
        }))
    }

    /// Most recent assignments hospital-wide with every party's name.
    pub fn recent_assignments(&self, limit: u32) -> Result<Vec<AssignmentDetail>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {A}, p.name, d.name, s.name, s.role
             FROM assignments a
             JOIN patients p ON p.id = a.patient_id
             JOIN staff d ON d.id = a.doctor_id
             JOIN staff s ON s.id = a.assignee_staff_id
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT ?"
        ))?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(AssignmentDetail {
                    assignment: assignment_from_row(row)?,
                    patient_name: Some(row.get(8)?),
                    doctor_name: Some(row.get(9)?),
                    assignee_name: Some(row.get(10)?),
                    assignee_role: Some(row.get(11)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Assignments a doctor has handed out, newest first.
    pub fn assignments_by_doctor(&self, doctor_id: i64, limit: u32) -> Result<Vec<AssignmentDetail>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {A}, p.name, s.name, s.role
             FROM assignments a
             JOIN patients p ON p.id = a.patient_id
             JOIN staff s ON s.id = a.assignee_staff_id
             WHERE a.doctor_id = ?
             ORDER BY a.id DESC
             LIMIT ?"
        ))?;
        let rows = stmt
            .query_map(params![doctor_id, limit], |row| {
                Ok(AssignmentDetail {
                    assignment: assignment_from_row(row)?,
                    patient_name: Some(row.get(8)?),
                    doctor_name: None,
                    assignee_name: Some(row.get(9)?),
                    assignee_role: Some(row.get(10)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Assignments waiting on a nurse or radiologist, newest first.
    pub fn assignments_for_assignee(
        &self,
        staff_id: i64,
        limit: u32,
    ) -> Result<Vec<AssignmentDetail>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {A}, p.name, d.name
             FROM assignments a
             JOIN patients p ON p.id = a.patient_id
             JOIN staff d ON d.id = a.doctor_id
             WHERE a.assignee_staff_id = ?
             ORDER BY a.id DESC
             LIMIT ?"
        ))?;
        let rows = stmt
            .query_map(params![staff_id, limit], |row| {
                Ok(AssignmentDetail {
                    assignment: assignment_from_row(row)?,
                    patient_name: Some(row.get(8)?),
                    doctor_name: Some(row.get(9)?),
                    assignee_name: None,
                    assignee_role: None,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Imaging reports for patients the doctor has delegated work for.
    ///
    /// A report counts as imaging when its type mentions a scan or radiology,
    /// or when a radiologist wrote it.
    pub fn imaging_reports_for_doctor(
        &self,
        doctor_id: i64,
        limit: u32,
    ) -> Result<Vec<ReportDetail>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {R}, s.name, s.role, p.name
             FROM reports r
             JOIN patients p ON p.id = r.patient_id
             JOIN staff s ON s.id = r.created_by_staff_id
             WHERE (r.report_type LIKE '%Scan%' OR r.report_type LIKE '%Radiology%' OR s.role = 'radiologist')
               AND r.patient_id IN (SELECT DISTINCT patient_id FROM assignments WHERE doctor_id = ?)
             ORDER BY r.id DESC
             LIMIT ?"
        ))?;
        let rows = stmt
            .query_map(params![doctor_id, limit], |row| {
                Ok(ReportDetail {
                    report: report_from_row(row)?,
                    staff_name: row.get(7)?,
                    staff_role: row.get(8)?,
                    patient_name: Some(row.get(9)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::WriteOutcome;
    use crate::models::{NewAssignment, NewOrder, NewReport, OrderStatus, StaffRole};

    #[test]
    fn history_lists_everything_newest_first() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let nurse = staff(&db, "Nina", StaffRole::Nurse, "nina@h.com");
        let pat = patient(&db, "Pat", "pat@h.com");

        for order_type in ["First", "Second"] {
            let order = NewOrder {
                patient_id: pat.id,
                doctor_id: doctor.id,
                order_type: order_type.to_string(),
                notes: None,
                status: OrderStatus::Pending,
            };
            assert!(matches!(db.create_order(&order).unwrap(), WriteOutcome::Applied(_)));
        }
        let assignment = NewAssignment {
            patient_id: pat.id,
            doctor_id: doctor.id,
            assignee_staff_id: nurse.id,
            task_type: "Vitals".to_string(),
            notes: None,
        };
        assert!(matches!(db.create_assignment(&assignment).unwrap(), WriteOutcome::Applied(_)));

        let history = db.patient_history(pat.id).unwrap().unwrap();
        assert_eq!(history.patient.id, pat.id);
        let types: Vec<_> = history
            .prescriptions
            .iter()
            .map(|o| o.order.order_type.as_str())
            .collect();
        assert_eq!(types, ["Second", "First"]);
        assert_eq!(history.prescriptions[0].doctor_name, "Dr. A");
        assert_eq!(history.assignments[0].assignee_name.as_deref(), Some("Nina"));
        assert_eq!(history.assignments[0].assignee_role, Some(StaffRole::Nurse));
        assert!(history.reports.is_empty());

        assert!(db.patient_history(pat.id + 100).unwrap().is_none());
    }

    #[test]
    fn imaging_reports_are_limited_to_the_doctors_patients() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let radiologist = staff(&db, "Ray", StaffRole::Radiologist, "ray@h.com");
        let mine = patient(&db, "Mine", "mine@h.com");
        let theirs = patient(&db, "Theirs", "theirs@h.com");

        let assignment = NewAssignment {
            patient_id: mine.id,
            doctor_id: doctor.id,
            assignee_staff_id: radiologist.id,
            task_type: "X-Ray".to_string(),
            notes: None,
        };
        assert!(matches!(db.create_assignment(&assignment).unwrap(), WriteOutcome::Applied(_)));

        for patient_id in [mine.id, theirs.id] {
            let report = NewReport {
                patient_id,
                created_by_staff_id: radiologist.id,
                report_type: "Report".to_string(),
                report_text: "Clear".to_string(),
                image_filename: None,
            };
            assert!(matches!(db.create_report(&report).unwrap(), WriteOutcome::Applied(_)));
        }

        let reports = db.imaging_reports_for_doctor(doctor.id, 200).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].report.patient_id, mine.id);
        assert_eq!(reports[0].patient_name.as_deref(), Some("Mine"));
    }
}
