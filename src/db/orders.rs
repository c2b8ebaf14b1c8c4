//! Orders and prescriptions.

use super::notifications::{new_prescription, notify_patient, order_completed};
use super::{begin_write, Database, WriteOutcome};
use crate::models::{NewOrder, Order, OrderChanges, OrderStatus};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ORDER_COLUMNS: &str = "id, patient_id, doctor_id, order_type, notes, status, created_at";

pub(crate) fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        order_type: row.get(3)?,
        notes: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Fetches an order only if `doctor_id` issued it.
fn owned_order(conn: &Connection, order_id: i64, doctor_id: i64) -> Result<Option<Order>> {
    let order = conn
        .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ? AND doctor_id = ?"),
            params![order_id, doctor_id],
            order_from_row,
        )
        .optional()?;
    Ok(order)
}

fn patient_exists(conn: &Connection, patient_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?)",
        params![patient_id],
        |row| row.get(0),
    )?)
}

impl Database {
    /// Creates an order issued by `order.doctor_id`.
    ///
    /// # Arguments
    ///
    /// * `order` - The patient, issuing doctor, type, notes and initial status.
    ///
    /// # Returns
    ///
    /// The stored order, or `WriteOutcome::NotFound` when the patient does not
    /// exist. Nothing is written in the latter case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the insert fails.
    pub fn create_order(&self, order: &NewOrder) -> Result<WriteOutcome<Order>> {
        self.insert_order(order, None)
    }

    /// Writes a prescription as an `Active` order whose type names the
    /// medication.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or either insert fails.
    ///
    /// # Side Effects
    ///
    /// Inserts one patient notification announcing the prescription, in the
    /// same transaction as the order.
    pub fn create_prescription(
        &self,
        patient_id: i64,
        doctor_id: i64,
        medication: &str,
        notes: String,
    ) -> Result<WriteOutcome<Order>> {
        let order = NewOrder {
            patient_id,
            doctor_id,
            order_type: format!("Prescription: {medication}"),
            notes: Some(notes),
            status: OrderStatus::Active,
        };
        self.insert_order(&order, Some(&new_prescription(medication)))
    }

    fn insert_order(
        &self,
        order: &NewOrder,
        patient_notice: Option<&str>,
    ) -> Result<WriteOutcome<Order>> {
        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        if !patient_exists(&tx, order.patient_id)? {
            return Ok(WriteOutcome::NotFound);
        }

        tx.execute(
            "INSERT INTO orders (patient_id, doctor_id, order_type, notes, status) VALUES (?, ?, ?, ?, ?)",
            params![
                order.patient_id,
                order.doctor_id,
                order.order_type,
                order.notes,
                order.status
            ],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(message) = patient_notice {
            notify_patient(&tx, order.patient_id, message)?;
        }
        let created = owned_order(&tx, id, order.doctor_id)?.context("Inserted order vanished")?;
        tx.commit()?;

        Ok(WriteOutcome::Applied(created))
    }

    #[cfg(test)]
    pub(crate) fn get_owned_order(&self, order_id: i64, doctor_id: i64) -> Result<Option<Order>> {
        let conn = self.connect()?;
        owned_order(&conn, order_id, doctor_id)
    }

    /// Applies `changes` to an order the doctor owns.
    ///
    /// Fields left as `None` in `changes` keep their stored value.
    ///
    /// # Arguments
    ///
    /// * `order_id` - The order to change.
    /// * `doctor_id` - The calling doctor; only their own orders are found.
    /// * `changes` - The fields to overwrite.
    ///
    /// # Returns
    ///
    /// The order as stored after the update, or `WriteOutcome::NotFound` when
    /// it does not exist or belongs to another doctor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, or the write lock is
    /// not granted within the busy timeout.
    ///
    /// # Side Effects
    ///
    /// Every update that sets the status to `Completed` inserts one
    /// notification for the order's patient.
    pub fn update_order(
        &self,
        order_id: i64,
        doctor_id: i64,
        changes: &OrderChanges,
    ) -> Result<WriteOutcome<Order>> {
        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        let Some(current) = owned_order(&tx, order_id, doctor_id)? else {
            return Ok(WriteOutcome::NotFound);
        };

        let updated = Order {
            order_type: changes
                .order_type
                .clone()
                .unwrap_or_else(|| current.order_type.clone()),
            notes: changes.notes.clone().unwrap_or_else(|| current.notes.clone()),
            status: changes.status.unwrap_or(current.status),
            ..current
        };

        tx.execute(
            "UPDATE orders SET order_type = ?, notes = ?, status = ? WHERE id = ? AND doctor_id = ?",
            params![
                updated.order_type,
                updated.notes,
                updated.status,
                order_id,
                doctor_id
            ],
        )?;

        if changes.status == Some(OrderStatus::Completed) {
            notify_patient(&tx, updated.patient_id, &order_completed(&updated.order_type))?;
        }
        tx.commit()?;

        tracing::info!(order_id, doctor_id, status = %updated.status, "order updated");
        Ok(WriteOutcome::Applied(updated))
    }

    /// Deletes an order the doctor owns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the delete fails.
    pub fn delete_order(&self, order_id: i64, doctor_id: i64) -> Result<WriteOutcome<()>> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM orders WHERE id = ? AND doctor_id = ?",
            params![order_id, doctor_id],
        )?;
        Ok(if removed == 0 {
            WriteOutcome::NotFound
        } else {
            WriteOutcome::Applied(())
        })
    }
}
