//! Route definitions for the `/integrations` resource.

use axum::routing::delete;
use axum::Router;

use crate::handlers::integrations;
use crate::state::AppState;

/// Routes mounted at `/integrations`.
///
/// ```text
/// DELETE /{id}/connector  -> invalidate_connector
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/connector", delete(integrations::invalidate_connector))
}
