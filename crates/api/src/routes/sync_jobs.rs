//! Route definitions for the `/sync-jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sync_jobs;
use crate::state::AppState;

/// Routes mounted at `/sync-jobs`.
///
/// ```text
/// POST   /                -> create_sync_job
/// GET    /{id}            -> get_sync_job
/// POST   /{id}/cancel     -> cancel_sync_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(sync_jobs::create_sync_job))
        .route("/{id}", get(sync_jobs::get_sync_job))
        .route("/{id}/cancel", post(sync_jobs::cancel_sync_job))
}
