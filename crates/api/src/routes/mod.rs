pub mod bulk_operations;
pub mod health;
pub mod integrations;
pub mod sync_jobs;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /sync-jobs                  create, get, cancel
/// /bulk-operations            upload, get, cancel, rollback, report, export
/// /integrations/{id}/connector  connector cache invalidation
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .nest("/sync-jobs", sync_jobs::router())
        .nest("/bulk-operations", bulk_operations::router(config))
        .nest("/integrations", integrations::router())
}
