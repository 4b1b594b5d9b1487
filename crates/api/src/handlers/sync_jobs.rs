//! Handlers for the `/sync-jobs` resource.
//!
//! Tenant scoping is enforced by the orchestrator: a job belonging to
//! another tenant is reported as not found.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use syncbridge_core::scheduling::SyncJobConfig;
use syncbridge_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/sync-jobs
///
/// Create a sync job and enqueue it. Returns 201 with the job in `queued`
/// status.
pub async fn create_sync_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SyncJobConfig>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .orchestrator
        .create_sync_job(&auth.caller(), &input)
        .await?;

    tracing::info!(
        job_id = job.id,
        integration_id = job.integration_id,
        user_id = auth.user_id,
        "Sync job submitted",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /api/v1/sync-jobs/{id}
pub async fn get_sync_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.get_job(&auth.caller(), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/sync-jobs/{id}/cancel
///
/// Cancel a job that has not finished. 409 if it already reached a
/// terminal status.
pub async fn cancel_sync_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .orchestrator
        .cancel_operation(&auth.caller(), job_id)
        .await?;

    tracing::info!(job_id, user_id = auth.user_id, "Sync job cancelled");

    Ok(Json(DataResponse { data: job }))
}
