//! Route definitions for the `/bulk-operations` resource.
//!
//! All endpoints require authentication.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers::bulk_operations;
use crate::state::AppState;

/// Room for multipart framing and the options part around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Routes mounted at `/bulk-operations`.
///
/// ```text
/// POST   /                -> create_bulk_operation (multipart)
/// GET    /{id}            -> get_bulk_operation
/// POST   /{id}/cancel     -> cancel_bulk_operation
/// POST   /{id}/rollback   -> rollback_bulk_operation
/// GET    /{id}/report     -> download_report
/// GET    /{id}/export     -> download_export
/// ```
pub fn router(config: &ServerConfig) -> Router<AppState> {
    let upload_limit = config.pipeline.import_limits.max_file_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route(
            "/",
            post(bulk_operations::create_bulk_operation).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/{id}", get(bulk_operations::get_bulk_operation))
        .route("/{id}/cancel", post(bulk_operations::cancel_bulk_operation))
        .route("/{id}/rollback", post(bulk_operations::rollback_bulk_operation))
        .route("/{id}/report", get(bulk_operations::download_report))
        .route("/{id}/export", get(bulk_operations::download_export))
}
