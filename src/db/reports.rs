//! Reports written by nurses and radiologists. Reports are never edited.

use super::notifications::{new_report, notify_patient};
use super::{begin_write, Database, WriteOutcome};
use crate::models::{NewReport, Report};
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

pub(crate) fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        created_by_staff_id: row.get(2)?,
        report_type: row.get(3)?,
        report_text: row.get(4)?,
        image_filename: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    /// Stores a report and tells the patient about it.
    /// `NotFound` means the patient does not exist.
    pub fn create_report(&self, report: &NewReport) -> Result<WriteOutcome<Report>> {
        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        let patient_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?)",
            params![report.patient_id],
            |row| row.get(0),
        )?;
        if !patient_exists {
            return Ok(WriteOutcome::NotFound);
        }

        tx.execute(
            "INSERT INTO reports (patient_id, created_by_staff_id, report_type, report_text, image_filename)
             VALUES (?, ?, ?, ?, ?)",
            params![
                report.patient_id,
                report.created_by_staff_id,
                report.report_type,
                report.report_text,
                report.image_filename
            ],
        )?;
        let id = tx.last_insert_rowid();
        notify_patient(&tx, report.patient_id, &new_report(&report.report_type))?;
        let created = tx
            .query_row(
                "SELECT id, patient_id, created_by_staff_id, report_type, report_text, image_filename, created_at
                 FROM reports WHERE id = ?",
                params![id],
                report_from_row,
            )
            .optional()?
            .context("Inserted report vanished")?;
        tx.commit()?;

        tracing::info!(
            report_id = id,
            patient_id = report.patient_id,
            author = report.created_by_staff_id,
            "report stored"
        );
        Ok(WriteOutcome::Applied(created))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::StaffRole;

    #[test]
    fn report_notifies_patient() {
        let (_dir, db) = fresh_db();
        let radiologist = staff(&db, "Ray", StaffRole::Radiologist, "ray@h.com");
        let pat = patient(&db, "Pat", "pat@h.com");

        let outcome = db
            .create_report(&NewReport {
                patient_id: pat.id,
                created_by_staff_id: radiologist.id,
                report_type: "MRI Scan".to_string(),
                report_text: "No abnormalities".to_string(),
                image_filename: Some("1700000000000_mri.png".to_string()),
            })
            .unwrap();
        let WriteOutcome::Applied(report) = outcome else {
            panic!("report refused");
        };
        assert_eq!(report.image_filename.as_deref(), Some("1700000000000_mri.png"));

        let notices = db.patient_notifications(pat.id, 50).unwrap();
        assert_eq!(notices[0].message, "New mri scan has been added to your records.");
    }
}
