//! Notification rows and the messages domain events produce.
//!
//! Notifications are only ever inserted as a side effect of another write, so
//! the insert helpers take the caller's connection (usually a transaction).

use super::Database;
use crate::models::{Notification, PatientNotification};
use anyhow::Result;
use rusqlite::{params, Connection};

pub(crate) fn notify_staff(conn: &Connection, staff_id: i64, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (staff_id, message) VALUES (?, ?)",
        params![staff_id, message],
    )?;
    Ok(())
}

pub(crate) fn notify_patient(conn: &Connection, patient_id: i64, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO patient_notifications (patient_id, message) VALUES (?, ?)",
        params![patient_id, message],
    )?;
    Ok(())
}

pub(crate) fn new_assignment_message(task_type: &str, patient_id: i64) -> String {
    format!("New assignment: {task_type} (Patient ID {patient_id})")
}

pub(crate) fn task_completed_for_doctor(task_type: &str, patient_id: i64) -> String {
    format!("Task '{task_type}' for patient #{patient_id} was completed.")
}

pub(crate) fn task_completed_for_patient(task_type: &str) -> String {
    format!("Your task '{task_type}' has been completed.")
}

pub(crate) fn order_completed(order_type: &str) -> String {
    format!("Your order '{order_type}' has been completed.")
}

pub(crate) fn new_prescription(medication: &str) -> String {
    format!("You have received a new prescription: {medication}")
}

pub(crate) fn new_report(report_type: &str) -> String {
    format!(
        "New {} has been added to your records.",
        report_type.to_lowercase()
    )
}

impl Database {
    /// Most recent staff notifications for `staff_id`, newest first.
    pub fn staff_notifications(&self, staff_id: i64, limit: u32) -> Result<Vec<Notification>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, staff_id, message, is_read, created_at FROM notifications
             WHERE staff_id = ? ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt
            .query_map(params![staff_id, limit], |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    staff_id: row.get(1)?,
                    message: row.get(2)?,
                    is_read: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent notifications for a patient, newest first.
    pub fn patient_notifications(
        &self,
        patient_id: i64,
        limit: u32,
    ) -> Result<Vec<PatientNotification>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, message, is_read, created_at FROM patient_notifications
             WHERE patient_id = ? ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt
            .query_map(params![patient_id, limit], |row| {
                Ok(PatientNotification {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    message: row.get(2)?,
                    is_read: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_message_lowercases_type() {
        assert_eq!(
            new_report("Chest X-Ray"),
            "New chest x-ray has been added to your records."
        );
    }

    #[test]
    fn completion_messages_name_the_task() {
        assert_eq!(
            task_completed_for_doctor("Lab Test", 7),
            "Task 'Lab Test' for patient #7 was completed."
        );
        assert_eq!(
            task_completed_for_patient("Lab Test"),
            "Your task 'Lab Test' has been completed."
        );
    }
}
