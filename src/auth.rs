use crate::db::Database;
use crate::models::SessionUser;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Credentials {
    /// Email address or username.
    pub identifier: String,
    pub password: String,
}

/// Checks credentials against patients first, then staff.
///
/// Returns `Ok(None)` for an unknown account or a wrong password. An account
/// found among patients is never retried against staff.
pub fn login(db: &Database, credentials: &Credentials) -> Result<Option<SessionUser>> {
    if let Some((patient, stored_hash)) = db.find_patient_login(&credentials.identifier)? {
        return Ok(verify(&credentials.password, &stored_hash)?
            .then(|| SessionUser::from_patient(&patient)));
    }

    if let Some((staff, stored_hash)) = db.find_staff_login(&credentials.identifier)? {
        return Ok(verify(&credentials.password, &stored_hash)?
            .then(|| SessionUser::from_staff(&staff)));
    }

    Ok(None)
}

fn verify(password: &str, stored_hash: &str) -> Result<bool> {
    bcrypt::verify(password, stored_hash).context("⚠️ Failed to verify password")
}
