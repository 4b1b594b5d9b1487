//! Handlers for the `/integrations` resource.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use syncbridge_core::error::CoreError;
use syncbridge_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConnectorInvalidated {
    pub integration_id: DbId,
    /// Whether a cached connector was actually dropped.
    pub evicted: bool,
}

/// DELETE /api/v1/integrations/{id}/connector
///
/// Drop the cached connector so the next job handshakes again, e.g. after
/// credentials were rotated.
pub async fn invalidate_connector(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(integration_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (_, tenant_id) = auth.caller().require_tenant()?;

    state
        .integrations
        .find_integration(tenant_id, integration_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Integration",
            id: integration_id,
        }))?;

    let evicted = state.connectors.invalidate(integration_id).await;
    tracing::info!(integration_id, evicted, user_id = auth.user_id, "Connector invalidated");

    Ok(Json(DataResponse {
        data: ConnectorInvalidated {
            integration_id,
            evicted,
        },
    }))
}
