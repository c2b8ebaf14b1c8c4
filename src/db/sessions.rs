//! Session rows.

use super::{query_patient, query_staff, sql_timestamp, Database};
use crate::models::{SessionUser, UserType};
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use time::OffsetDateTime;

impl Database {
    /// Stores a new session row.
    ///
    /// # Arguments
    ///
    /// * `token` - The session token, used as the row's primary key.
    /// * `user_id` - The patient or staff id the session belongs to.
    /// * `user_type` - Which table `user_id` points into.
    /// * `expires_at` - When the session stops being accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the token is
    /// already taken.
    pub fn insert_session(
        &self,
        token: &str,
        user_id: i64,
        user_type: UserType,
        expires_at: OffsetDateTime,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, user_type, expires_at) VALUES (?, ?, ?, ?)",
            params![token, user_id, user_type, sql_timestamp(expires_at)?],
        )?;
        Ok(())
    }

    /// Whether `token` names an unexpired session. Does not touch user rows.
    pub fn session_is_valid(&self, token: &str, now: OffsetDateTime) -> Result<bool> {
        let conn = self.connect()?;
        let valid = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ? AND expires_at > ?)",
            params![token, sql_timestamp(now)?],
            |row| row.get(0),
        )?;
        Ok(valid)
    }

    /// Resolves an unexpired session to the identity it belongs to.
    ///
    /// Returns `None` when the token is unknown, expired, or points at a user
    /// row that no longer exists.
    pub fn session_user(&self, token: &str, now: OffsetDateTime) -> Result<Option<SessionUser>> {
        let conn = self.connect()?;
        let session: Option<(i64, UserType)> = conn
            .query_row(
                "SELECT user_id, user_type FROM sessions WHERE id = ? AND expires_at > ?",
                params![token, sql_timestamp(now)?],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let user = match session {
            None => None,
            Some((user_id, UserType::Patient)) => {
                query_patient(&conn, user_id)?.map(|patient| SessionUser::from_patient(&patient))
            }
            Some((user_id, UserType::Staff)) => {
                query_staff(&conn, user_id)?.map(|staff| SessionUser::from_staff(&staff))
            }
        };
        Ok(user)
    }

    /// Deletes a session. Unknown tokens are not an error.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM sessions WHERE id = ?", params![token])?;
        Ok(())
    }

    /// Removes every session that has expired, returning how many went.
    pub fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            params![sql_timestamp(now)?],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::models::{Role, StaffRole};
    use time::Duration;

    #[test]
    fn session_resolves_to_staff_identity() {
        let (_dir, db) = fresh_db();
        let nurse = staff(&db, "Nina", StaffRole::Nurse, "nina@h.com");
        let now = time::OffsetDateTime::now_utc();
        db.insert_session("tok", nurse.id, crate::models::UserType::Staff, now + Duration::days(7))
            .unwrap();

        let user = db.session_user("tok", now).unwrap().unwrap();
        assert_eq!(user.id, nurse.id);
        assert_eq!(user.role, Role::NURSE);
        assert!(db.session_is_valid("tok", now).unwrap());
    }

    #[test]
    fn expired_session_is_invalid_and_purged() {
        let (_dir, db) = fresh_db();
        let pat = patient(&db, "Pat", "pat@h.com");
        let now = time::OffsetDateTime::now_utc();
        db.insert_session("old", pat.id, crate::models::UserType::Patient, now - Duration::seconds(5))
            .unwrap();

        assert!(db.session_user("old", now).unwrap().is_none());
        assert!(!db.session_is_valid("old", now).unwrap());
        assert_eq!(db.purge_expired_sessions(now).unwrap(), 1);
    }

    #[test]
    fn deleting_unknown_session_is_fine() {
        let (_dir, db) = fresh_db();
        db.delete_session("never-issued").unwrap();
    }
}
