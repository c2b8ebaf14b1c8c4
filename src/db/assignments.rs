//! Assignments: tasks a doctor delegates to a nurse or radiologist.
//!
//! The owning doctor may edit, reassign or delete an assignment. The assignee
//! may only move its status. Both paths look the row up by id *and* caller, so
//! somebody else's assignment is indistinguishable from a missing one.

use super::notifications::{
    new_assignment_message, notify_patient, notify_staff, task_completed_for_doctor,
    task_completed_for_patient,
};
use super::{begin_write, query_staff, Database, WriteOutcome};
use crate::models::{Assignment, AssignmentChanges, AssignmentStatus, NewAssignment};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub const INVALID_ASSIGNEE: &str = "Assignee must be an available nurse or radiologist";

const ASSIGNMENT_COLUMNS: &str =
    "id, patient_id, doctor_id, assignee_staff_id, task_type, notes, status, created_at";

pub(crate) fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        assignee_staff_id: row.get(3)?,
        task_type: row.get(4)?,
        notes: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Which column ties the caller to the assignment.
#[derive(Clone, Copy)]
enum Holder {
    Doctor,
    Assignee,
}

fn held_assignment(
    conn: &Connection,
    assignment_id: i64,
    holder: Holder,
    caller_id: i64,
) -> Result<Option<Assignment>> {
    let column = match holder {
        Holder::Doctor => "doctor_id",
        Holder::Assignee => "assignee_staff_id",
    };
    let assignment = conn
        .query_row(
            &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ? AND {column} = ?"),
            params![assignment_id, caller_id],
            assignment_from_row,
        )
        .optional()?;
    Ok(assignment)
}

/// An assignee must exist, be available, and hold a role that takes assignments.
fn is_eligible_assignee(conn: &Connection, staff_id: i64) -> Result<bool> {
    Ok(query_staff(conn, staff_id)?
        .map(|staff| staff.is_available && staff.role.takes_assignments())
        .unwrap_or(false))
}

impl Database {
    /// Creates an assignment in the `Assigned` state.
    ///
    /// # Arguments
    ///
    /// * `new` - The patient, the delegating doctor, the assignee, the task and
    ///   optional notes.
    ///
    /// # Returns
    ///
    /// The stored assignment. `WriteOutcome::Rejected` when the assignee is not
    /// an available nurse or radiologist, `WriteOutcome::NotFound` when the
    /// patient does not exist. Neither of those writes anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, or the write lock is
    /// not granted within the busy timeout.
    ///
    /// # Side Effects
    ///
    /// Inserts one staff notification for the assignee.
    pub fn create_assignment(&self, new: &NewAssignment) -> Result<WriteOutcome<Assignment>> {
        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        if !is_eligible_assignee(&tx, new.assignee_staff_id)? {
            return Ok(WriteOutcome::Rejected(INVALID_ASSIGNEE));
        }
        let patient_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?)",
            params![new.patient_id],
            |row| row.get(0),
        )?;
        if !patient_exists {
            return Ok(WriteOutcome::NotFound);
        }

        tx.execute(
            "INSERT INTO assignments (patient_id, doctor_id, assignee_staff_id, task_type, notes, status)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                new.patient_id,
                new.doctor_id,
                new.assignee_staff_id,
                new.task_type,
                new.notes,
                AssignmentStatus::Assigned
            ],
        )?;
        let id = tx.last_insert_rowid();
        notify_staff(
            &tx,
            new.assignee_staff_id,
            &new_assignment_message(&new.task_type, new.patient_id),
        )?;
        let created = held_assignment(&tx, id, Holder::Doctor, new.doctor_id)?
            .context("Inserted assignment vanished")?;
        tx.commit()?;

        tracing::info!(
            assignment_id = id,
            doctor_id = new.doctor_id,
            assignee = new.assignee_staff_id,
            "assignment created"
        );
        Ok(WriteOutcome::Applied(created))
    }

    #[cfg(test)]
    pub(crate) fn get_owned_assignment(
        &self,
        assignment_id: i64,
        doctor_id: i64,
    ) -> Result<Option<Assignment>> {
        let conn = self.connect()?;
        held_assignment(&conn, assignment_id, Holder::Doctor, doctor_id)
    }

    /// Edits an assignment on behalf of its doctor.
    ///
    /// Fields left as `None` in `changes` keep their stored value. A new
    /// assignee is re-validated like at creation time.
    ///
    /// # Returns
    ///
    /// The assignment as stored after the update. `WriteOutcome::NotFound`
    /// when it does not exist or another doctor created it;
    /// `WriteOutcome::Rejected` when the new assignee is not eligible.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, or the write lock is
    /// not granted within the busy timeout.
    ///
    /// # Side Effects
    ///
    /// A changed assignee receives a staff notification. Completing the task
    /// this way notifies no one.
    pub fn update_assignment(
        &self,
        assignment_id: i64,
        doctor_id: i64,
        changes: &AssignmentChanges,
    ) -> Result<WriteOutcome<Assignment>> {
        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        let Some(current) = held_assignment(&tx, assignment_id, Holder::Doctor, doctor_id)? else {
            return Ok(WriteOutcome::NotFound);
        };

        let reassigned_to = changes
            .assignee_staff_id
            .filter(|&staff_id| staff_id != current.assignee_staff_id);
        if let Some(staff_id) = reassigned_to {
            if !is_eligible_assignee(&tx, staff_id)? {
                return Ok(WriteOutcome::Rejected(INVALID_ASSIGNEE));
            }
        }

        let updated = Assignment {
            task_type: changes
                .task_type
                .clone()
                .unwrap_or_else(|| current.task_type.clone()),
            notes: changes.notes.clone().unwrap_or_else(|| current.notes.clone()),
            assignee_staff_id: reassigned_to.unwrap_or(current.assignee_staff_id),
            status: changes.status.unwrap_or(current.status),
            ..current
        };

        tx.execute(
            "UPDATE assignments SET task_type = ?, notes = ?, assignee_staff_id = ?, status = ?
             WHERE id = ? AND doctor_id = ?",
            params![
                updated.task_type,
                updated.notes,
                updated.assignee_staff_id,
                updated.status,
                assignment_id,
                doctor_id
            ],
        )?;
        if let Some(staff_id) = reassigned_to {
            notify_staff(
                &tx,
                staff_id,
                &new_assignment_message(&updated.task_type, updated.patient_id),
            )?;
        }
        tx.commit()?;

        Ok(WriteOutcome::Applied(updated))
    }

    /// Deletes an assignment on behalf of its doctor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the delete fails.
    pub fn delete_assignment(&self, assignment_id: i64, doctor_id: i64) -> Result<WriteOutcome<()>> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM assignments WHERE id = ? AND doctor_id = ?",
            params![assignment_id, doctor_id],
        )?;
        Ok(if removed == 0 {
            WriteOutcome::NotFound
        } else {
            WriteOutcome::Applied(())
        })
    }

    /// Moves an assignment's status on behalf of its assignee.
    ///
    /// # Arguments
    ///
    /// * `assignment_id` - The assignment to move.
    /// * `assignee_id` - The calling nurse or radiologist.
    /// * `status` - The new status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, or the write lock is
    /// not granted within the busy timeout.
    ///
    /// # Side Effects
    ///
    /// Completion notifies both the assigning doctor and the patient.
    pub fn set_assignment_status(
        &self,
        assignment_id: i64,
        assignee_id: i64,
        status: AssignmentStatus,
    ) -> Result<WriteOutcome<Assignment>> {
        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        let Some(current) = held_assignment(&tx, assignment_id, Holder::Assignee, assignee_id)?
        else {
            return Ok(WriteOutcome::NotFound);
        };

        tx.execute(
            "UPDATE assignments SET status = ? WHERE id = ? AND assignee_staff_id = ?",
            params![status, assignment_id, assignee_id],
        )?;

        if status == AssignmentStatus::Completed {
            notify_staff(
                &tx,
                current.doctor_id,
                &task_completed_for_doctor(&current.task_type, current.patient_id),
            )?;
            notify_patient(
                &tx,
                current.patient_id,
                &task_completed_for_patient(&current.task_type),
            )?;
        }
        tx.commit()?;

        tracing::info!(assignment_id, assignee_id, %status, "assignment status changed");
        Ok(WriteOutcome::Applied(Assignment { status, ..current }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::StaffRole;

    fn lab_test(patient_id: i64, doctor_id: i64, assignee_staff_id: i64) -> NewAssignment {
        NewAssignment {
            patient_id,
            doctor_id,
            assignee_staff_id,
            task_type: "Lab Test".to_string(),
            notes: None,
        }
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.connect()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn lab_test_scenario_notifies_each_party() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let nurse = staff(&db, "Nina", StaffRole::Nurse, "nina@h.com");
        let pat = patient(&db, "Pat", "pat@h.com");

        let created = match db.create_assignment(&lab_test(pat.id, doctor.id, nurse.id)).unwrap() {
            WriteOutcome::Applied(assignment) => assignment,
            other => panic!("{other:?}"),
        };
        assert_eq!(created.status, AssignmentStatus::Assigned);
        let nurse_notes = db.staff_notifications(nurse.id, 50).unwrap();
        assert_eq!(nurse_notes.len(), 1);
        assert_eq!(
            nurse_notes[0].message,
            format!("New assignment: Lab Test (Patient ID {})", pat.id)
        );

        let done = db
            .set_assignment_status(created.id, nurse.id, AssignmentStatus::Completed)
            .unwrap();
        assert!(matches!(done, WriteOutcome::Applied(ref a) if a.status == AssignmentStatus::Completed));
        assert_eq!(db.staff_notifications(doctor.id, 50).unwrap().len(), 1);
        assert_eq!(db.patient_notifications(pat.id, 50).unwrap().len(), 1);
    }

    #[test]
    fn ineligible_assignees_are_rejected_without_writes() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let other_doctor = staff(&db, "Dr. B", StaffRole::Doctor, "b@h.com");
        let off_duty = staff(&db, "Ned", StaffRole::Radiologist, "ned@h.com");
        db.set_staff_availability(off_duty.id, false).unwrap();
        let pat = patient(&db, "Pat", "pat@h.com");

        for assignee in [other_doctor.id, off_duty.id, 4242] {
            assert_eq!(
                db.create_assignment(&lab_test(pat.id, doctor.id, assignee)).unwrap(),
                WriteOutcome::Rejected(INVALID_ASSIGNEE)
            );
        }
        assert_eq!(count(&db, "assignments"), 0);
        assert_eq!(count(&db, "notifications"), 0);
    }

    #[test]
    fn only_the_assignee_moves_status() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let nurse = staff(&db, "Nina", StaffRole::Nurse, "nina@h.com");
        let other_nurse = staff(&db, "Nora", StaffRole::Nurse, "nora@h.com");
        let pat = patient(&db, "Pat", "pat@h.com");
        let WriteOutcome::Applied(created) =
            db.create_assignment(&lab_test(pat.id, doctor.id, nurse.id)).unwrap()
        else {
            panic!("assignment not created");
        };

        assert_eq!(
            db.set_assignment_status(created.id, other_nurse.id, AssignmentStatus::Completed)
                .unwrap(),
            WriteOutcome::NotFound
        );
        assert_eq!(
            db.get_owned_assignment(created.id, doctor.id).unwrap().unwrap().status,
            AssignmentStatus::Assigned
        );
    }

    #[test]
    fn reassignment_validates_and_notifies_new_assignee() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let nurse = staff(&db, "Nina", StaffRole::Nurse, "nina@h.com");
        let radiologist = staff(&db, "Ray", StaffRole::Radiologist, "ray@h.com");
        let pat = patient(&db, "Pat", "pat@h.com");
        let WriteOutcome::Applied(created) =
            db.create_assignment(&lab_test(pat.id, doctor.id, nurse.id)).unwrap()
        else {
            panic!("assignment not created");
        };

        let to_doctor = AssignmentChanges {
            assignee_staff_id: Some(doctor.id),
            ..Default::default()
        };
        assert_eq!(
            db.update_assignment(created.id, doctor.id, &to_doctor).unwrap(),
            WriteOutcome::Rejected(INVALID_ASSIGNEE)
        );

        let to_radiologist = AssignmentChanges {
            assignee_staff_id: Some(radiologist.id),
            task_type: Some("CT Scan".to_string()),
            ..Default::default()
        };
        let WriteOutcome::Applied(updated) = db
            .update_assignment(created.id, doctor.id, &to_radiologist)
            .unwrap()
        else {
            panic!("reassignment refused");
        };
        assert_eq!(updated.assignee_staff_id, radiologist.id);
        assert_eq!(updated.task_type, "CT Scan");
        assert_eq!(db.staff_notifications(radiologist.id, 50).unwrap().len(), 1);
    }

    #[test]
    fn other_doctors_cannot_edit_assignment() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let intruder = staff(&db, "Dr. B", StaffRole::Doctor, "b@h.com");
        let nurse = staff(&db, "Nina", StaffRole::Nurse, "nina@h.com");
        let radiologist = staff(&db, "Ray", StaffRole::Radiologist, "ray@h.com");
        let pat = patient(&db, "Pat", "pat@h.com");
        let WriteOutcome::Applied(created) =
            db.create_assignment(&lab_test(pat.id, doctor.id, nurse.id)).unwrap()
        else {
            panic!("assignment not created");
        };
        let staff_notices = count(&db, "notifications");

        let hijack = AssignmentChanges {
            task_type: Some("MRI".to_string()),
            assignee_staff_id: Some(radiologist.id),
            status: Some(AssignmentStatus::Completed),
            ..Default::default()
        };
        assert_eq!(
            db.update_assignment(created.id, intruder.id, &hijack).unwrap(),
            WriteOutcome::NotFound
        );

        let stored = db.get_owned_assignment(created.id, doctor.id).unwrap().unwrap();
        assert_eq!(stored, created);
        assert_eq!(count(&db, "notifications"), staff_notices);
        assert_eq!(count(&db, "patient_notifications"), 0);
    }

    #[test]
    fn delete_requires_ownership() {
        let (_dir, db) = fresh_db();
        let doctor = staff(&db, "Dr. A", StaffRole::Doctor, "a@h.com");
        let intruder = staff(&db, "Dr. B", StaffRole::Doctor, "b@h.com");
        let nurse = staff(&db, "Nina", StaffRole::Nurse, "nina@h.com");
        let pat = patient(&db, "Pat", "pat@h.com");
        let WriteOutcome::Applied(created) =
            db.create_assignment(&lab_test(pat.id, doctor.id, nurse.id)).unwrap()
        else {
            panic!("assignment not created");
        };

        assert_eq!(
            db.delete_assignment(created.id, intruder.id).unwrap(),
            WriteOutcome::NotFound
        );
        assert_eq!(
            db.delete_assignment(created.id, doctor.id).unwrap(),
            WriteOutcome::Applied(())
        );
        assert!(db.get_owned_assignment(created.id, doctor.id).unwrap().is_none());
    }
}
