//! Database module for Wardline.
//!
//! All persistence goes through [`Database`], which opens a fresh SQLite
//! connection per operation. Patients and staff live in this file; orders,
//! assignments, reports, notifications, sessions and the read-side history
//! queries each have their own submodule adding methods to [`Database`].
//!
//! Operations that write more than one row (a mutation plus its notifications)
//! run inside a single transaction.

mod assignments;
mod history;
mod notifications;
mod orders;
mod reports;
mod sessions;

use crate::models::{
    username_from_email, NewPatient, NewStaffMember, Patient, StaffMember, StaffRole,
};
use anyhow::{Context, Result};
use bcrypt::hash;
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;

/// The seeded administrator account, created on first start.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@hospital.com";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const PATIENT_COLUMNS: &str = "id, name, email, username, phone, dob, gender, created_at";
const STAFF_COLUMNS: &str =
    "id, name, role, category, email, username, phone, is_available, created_at";

/// Result of a write that the domain rules may refuse.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// The write went through.
    Applied(T),
    /// The target row does not exist or does not belong to the caller.
    NotFound,
    /// The input broke a domain rule; nothing was written.
    Rejected(&'static str),
}

/// Handle on the SQLite database file.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Creates a handle; nothing is opened until the first operation.
    pub fn new(path: impl AsRef<Path>, busy_timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        }
    }

    /// Opens a connection with the per-connection pragmas applied.
    ///
    /// A query that waits on a lock for longer than the busy timeout fails
    /// with `SQLITE_BUSY`, which the HTTP layer reports as unavailable.
    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("Failed to open database at {}", self.path.display()))?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }

    /// Initializes the database.
    ///
    /// Creates the tables defined in `schema.sql` if they do not exist yet and
    /// seeds the default administrator when no staff member holds the
    /// `admin` username. Runs once at startup, before any request is served.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, the schema cannot be
    /// executed, or the administrator cannot be created.
    pub fn init_db(&self, bcrypt_cost: u32) -> Result<()> {
        let conn = self.connect()?;

        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "database opened");

        conn.execute_batch(include_str!("schema.sql"))
            .context("Failed to execute schema")?;

        let admin_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM staff WHERE username = ?)",
            params![DEFAULT_ADMIN_USERNAME],
            |row| row.get(0),
        )?;

        if !admin_exists {
            let hashed_password =
                hash(DEFAULT_ADMIN_PASSWORD, bcrypt_cost).context("Failed to hash password")?;
            conn.execute(
                "INSERT INTO staff (name, role, category, email, username, password_hash, is_available)
                 VALUES (?, ?, ?, ?, ?, ?, 1)",
                params![
                    "Administrator",
                    StaffRole::Admin,
                    "Management",
                    DEFAULT_ADMIN_EMAIL,
                    DEFAULT_ADMIN_USERNAME,
                    hashed_password
                ],
            )?;
            tracing::info!(email = DEFAULT_ADMIN_EMAIL, "created default administrator");
        }

        Ok(())
    }

    /// Registers a patient, hashing the password before it is stored.
    ///
    /// The username is derived from the email's local part. A taken email or
    /// username is rejected without writing anything.
    pub fn create_patient(
        &self,
        patient: &NewPatient,
        bcrypt_cost: u32,
    ) -> Result<WriteOutcome<Patient>> {
        let hashed_password =
            hash(&patient.password, bcrypt_cost).context("Failed to hash password")?;
        let username = username_from_email(&patient.email);

        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        if exists(&tx, "SELECT 1 FROM patients WHERE email = ?", &patient.email)? {
            return Ok(WriteOutcome::Rejected("Email already registered"));
        }
        if exists(&tx, "SELECT 1 FROM patients WHERE username = ?", &username)? {
            return Ok(WriteOutcome::Rejected("Username already taken"));
        }

        tx.execute(
            "INSERT INTO patients (name, email, username, password_hash, phone, dob, gender)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                patient.name,
                patient.email,
                username,
                hashed_password,
                patient.phone,
                patient.dob,
                patient.gender,
            ],
        )?;
        let id = tx.last_insert_rowid();
        let created = query_patient(&tx, id)?.context("Inserted patient vanished")?;
        tx.commit()?;

        Ok(WriteOutcome::Applied(created))
    }

    /// Retrieves a single patient by ID, or `None` if there is no such row.
    pub fn get_patient(&self, patient_id: i64) -> Result<Option<Patient>> {
        let conn = self.connect()?;
        query_patient(&conn, patient_id)
    }

    /// Retrieves all patients, newest first.
    pub fn get_all_patients(&self) -> Result<Vec<Patient>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC, id DESC"
        ))?;
        let patients = stmt
            .query_map([], patient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }

    /// Looks a patient up by email or username and returns it with its
    /// password hash.
    pub fn find_patient_login(&self, identifier: &str) -> Result<Option<(Patient, String)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS}, password_hash FROM patients
             WHERE email = ?1 OR username = ?1
             ORDER BY email = ?1 DESC LIMIT 1"
        ))?;
        let found = stmt
            .query_row(params![identifier], |row| {
                Ok((patient_from_row(row)?, row.get(8)?))
            })
            .optional()?;
        Ok(found)
    }

    /// Creates a staff member. New staff start out available.
    pub fn create_staff_member(
        &self,
        staff_member: &NewStaffMember,
        bcrypt_cost: u32,
    ) -> Result<WriteOutcome<StaffMember>> {
        let hashed_password =
            hash(&staff_member.password, bcrypt_cost).context("Failed to hash password")?;
        let username = username_from_email(&staff_member.email);

        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;

        if exists(&tx, "SELECT 1 FROM staff WHERE email = ?", &staff_member.email)? {
            return Ok(WriteOutcome::Rejected("Email already registered"));
        }
        if exists(&tx, "SELECT 1 FROM staff WHERE username = ?", &username)? {
            return Ok(WriteOutcome::Rejected("Username already taken"));
        }

        tx.execute(
            "INSERT INTO staff (name, role, category, email, username, password_hash, phone, is_available)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
            params![
                staff_member.name,
                staff_member.role,
                staff_member.category,
                staff_member.email,
                username,
                hashed_password,
                staff_member.phone,
            ],
        )?;
        let id = tx.last_insert_rowid();
        let created = query_staff(&tx, id)?.context("Inserted staff member vanished")?;
        tx.commit()?;

        Ok(WriteOutcome::Applied(created))
    }

    /// Retrieves a single staff member by ID, or `None` if there is no such row.
    pub fn get_staff(&self, staff_id: i64) -> Result<Option<StaffMember>> {
        let conn = self.connect()?;
        query_staff(&conn, staff_id)
    }

    /// Retrieves all staff members, newest first.
    pub fn get_all_staff(&self) -> Result<Vec<StaffMember>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff ORDER BY created_at DESC, id DESC"
        ))?;
        let staff = stmt
            .query_map([], staff_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(staff)
    }

    /// Available staff holding `role`, ordered by name.
    pub fn get_available_staff(&self, role: StaffRole) -> Result<Vec<StaffMember>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff WHERE role = ? AND is_available = 1 ORDER BY name"
        ))?;
        let staff = stmt
            .query_map(params![role], staff_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(staff)
    }

    /// Looks a staff member up by email or username and returns it with its
    /// password hash.
    pub fn find_staff_login(&self, identifier: &str) -> Result<Option<(StaffMember, String)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STAFF_COLUMNS}, password_hash FROM staff
             WHERE email = ?1 OR username = ?1
             ORDER BY email = ?1 DESC LIMIT 1"
        ))?;
        let found = stmt
            .query_row(params![identifier], |row| Ok((staff_from_row(row)?, row.get(9)?)))
            .optional()?;
        Ok(found)
    }

    /// Marks a staff member as (un)available for new assignments.
    pub fn set_staff_availability(&self, staff_id: i64, available: bool) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE staff SET is_available = ? WHERE id = ?",
            params![available, staff_id],
        )?;
        Ok(changed > 0)
    }
}

/// Starts a transaction that takes the write lock at `BEGIN`.
///
/// A deferred transaction that reads first cannot upgrade to a writer once
/// another connection has committed in between; SQLite fails it with
/// `SQLITE_BUSY` immediately instead of honouring the busy timeout. Every
/// read-then-write unit in this module goes through here.
pub(crate) fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to begin write transaction")
}

fn exists(conn: &Connection, sql: &str, value: &str) -> Result<bool> {
    Ok(conn
        .query_row(sql, params![value], |_| Ok(()))
        .optional()?
        .is_some())
}

fn query_patient(conn: &Connection, patient_id: i64) -> Result<Option<Patient>> {
    let patient = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"),
            params![patient_id],
            patient_from_row,
        )
        .optional()?;
    Ok(patient)
}

pub(crate) fn query_staff(conn: &Connection, staff_id: i64) -> Result<Option<StaffMember>> {
    let staff = conn
        .query_row(
            &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?"),
            params![staff_id],
            staff_from_row,
        )
        .optional()?;
    Ok(staff)
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        username: row.get(3)?,
        phone: row.get(4)?,
        dob: row.get(5)?,
        gender: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn staff_from_row(row: &Row<'_>) -> rusqlite::Result<StaffMember> {
    Ok(StaffMember {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        category: row.get(3)?,
        email: row.get(4)?,
        username: row.get(5)?,
        phone: row.get(6)?,
        is_available: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Formats a timestamp the way SQLite's `datetime()` does, so stored
/// timestamps compare correctly as text.
pub fn sql_timestamp(at: OffsetDateTime) -> Result<String> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .context("Failed to format timestamp")
}

fn sqlite_failure(err: &anyhow::Error) -> Option<(&rusqlite::ffi::Error, Option<&str>)> {
    err.chain()
        .find_map(|cause| match cause.downcast_ref::<rusqlite::Error>() {
            Some(rusqlite::Error::SqliteFailure(code, message)) => Some((code, message.as_deref())),
            _ => None,
        })
}

/// True when `err` comes from querying tables that were never created.
pub fn is_uninitialized(err: &anyhow::Error) -> bool {
    matches!(sqlite_failure(err), Some((_, Some(message))) if message.contains("no such table"))
}

/// True when `err` is SQLite giving up on a lock after the busy timeout.
pub fn is_busy(err: &anyhow::Error) -> bool {
    matches!(
        sqlite_failure(err),
        Some((code, _)) if matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub const TEST_COST: u32 = 4;

    /// A freshly initialized database in a temporary directory.
    pub fn fresh_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db"), Duration::from_secs(5));
        db.init_db(TEST_COST).unwrap();
        (dir, db)
    }

    pub fn patient(db: &Database, name: &str, email: &str) -> Patient {
        let new = NewPatient {
            name: name.to_string(),
            email: email.to_string(),
            password: "secret".to_string(),
            phone: None,
            dob: None,
            gender: None,
        };
        match db.create_patient(&new, TEST_COST).unwrap() {
            WriteOutcome::Applied(patient) => patient,
            other => panic!("patient not created: {other:?}"),
        }
    }

    pub fn staff(db: &Database, name: &str, role: StaffRole, email: &str) -> StaffMember {
        let new = NewStaffMember {
            name: name.to_string(),
            role,
            category: None,
            email: email.to_string(),
            password: "secret".to_string(),
            phone: None,
        };
        match db.create_staff_member(&new, TEST_COST).unwrap() {
            WriteOutcome::Applied(staff) => staff,
            other => panic!("staff not created: {other:?}"),
        }
    }
}
