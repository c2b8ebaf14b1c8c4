//! Wardline: role-based hospital administration over HTTP.
//!
//! Patients, doctors, nurses, radiologists and administrators share one
//! SQLite record store. Doctors write orders and prescriptions and delegate
//! tasks; nurses and radiologists work those tasks and file reports; every
//! hand-off leaves a notification for the people it concerns.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod models;
pub mod routes;
pub mod session;
pub mod uploads;
