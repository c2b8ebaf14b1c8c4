//! Application state and HTTP router for Wardline.
//!
//! [`AppState`] is cloned into every handler. It holds no mutable state: the
//! database handle opens a connection per operation, and all storage work is
//! moved onto the blocking thread pool through [`AppState::blocking`].

use crate::config::Config;
use crate::db::Database;
use crate::error::ApiError;
use crate::gate;
use crate::routes::{admin, auth, dashboard, data, doctor, staff};
use crate::session::SessionSettings;
use crate::uploads::UploadStore;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: SessionSettings,
    pub uploads: UploadStore,
    /// Work factor used whenever a new password is hashed.
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            db: Database::new(&config.database, config.db_timeout()),
            sessions: SessionSettings {
                ttl: config.session_ttl(),
                secure: config.secure_cookies,
            },
            uploads: UploadStore::new(&config.upload_dir, config.max_upload_bytes()),
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Runs a storage operation on the blocking pool.
    pub async fn blocking<F, T>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || op(&db)).await??)
    }
}

/// Builds the full router: JSON API, gated dashboards and uploaded files.
pub fn router(state: AppState) -> Router {
    let dashboards = Router::new()
        .route("/admin", get(dashboard::admin))
        .route("/doctor", get(dashboard::doctor))
        .route("/nurse", get(dashboard::nurse))
        .route("/radiologist", get(dashboard::radiologist))
        .route("/patient", get(dashboard::patient))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gate::require_session,
        ));

    let api = Router::new()
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Admin
        .route("/admin/staff", post(admin::create_staff))
        .route("/admin/staff/:id/availability", put(admin::set_availability))
        .route("/admin/patients", post(admin::create_patient))
        // Doctor
        .route("/doctor/orders", post(doctor::create_order))
        .route("/doctor/orders/update-status", post(doctor::update_order_status))
        .route(
            "/doctor/orders/:id",
            put(doctor::update_order).delete(doctor::delete_order),
        )
        .route("/doctor/prescriptions", post(doctor::create_prescription))
        .route("/doctor/assignments", post(doctor::create_assignment))
        .route(
            "/doctor/assignments/:id",
            put(doctor::update_assignment).delete(doctor::delete_assignment),
        )
        .route("/doctor/patient-history", get(doctor::patient_history))
        // Nurses and radiologists
        .route(
            "/staff/assignments/update-status",
            post(staff::update_assignment_status),
        )
        .route(
            "/staff/reports",
            post(staff::create_report).layer(DefaultBodyLimit::max(state.uploads.max_bytes())),
        )
        // Shared lookups
        .route("/data/patients", get(data::patients))
        .route("/data/staff", get(data::staff))
        .route("/data/assignments", get(data::assignments));

    Router::new()
        .route("/", get(dashboard::root))
        .merge(dashboards)
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(state.uploads.dir()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
