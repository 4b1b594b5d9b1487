//! Handlers for the `/bulk-operations` resource.
//!
//! Uploads are accepted as `multipart/form-data` with two parts:
//!
//! - `file`: the CSV document
//! - `options`: JSON [`BulkOptions`]
//!
//! Processing happens in the background; the create and rollback endpoints
//! return 202 with the operation as persisted at that moment.

use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use syncbridge_core::bulk::{BulkOptions, CsvUpload};
use syncbridge_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Read the `file` and `options` parts. Unknown parts are ignored.
async fn read_upload(mut multipart: Multipart) -> AppResult<(CsvUpload, BulkOptions)> {
    let mut upload = None;
    let mut options = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.csv").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                upload = Some(CsvUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("options") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let parsed: BulkOptions = serde_json::from_str(&text)
                    .map_err(|e| AppError::BadRequest(format!("Invalid options JSON: {e}")))?;
                options = Some(parsed);
            }
            _ => {}
        }
    }

    let upload =
        upload.ok_or_else(|| AppError::BadRequest("Missing multipart part 'file'".to_string()))?;
    let options = options
        .ok_or_else(|| AppError::BadRequest("Missing multipart part 'options'".to_string()))?;
    Ok((upload, options))
}

fn csv_attachment(file_name: String, body: String) -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
}

/// POST /api/v1/bulk-operations
///
/// Validate the upload, persist the operation and start processing it.
/// Rejected uploads (bad options, not CSV, missing key column, too large)
/// return 400 and persist nothing.
pub async fn create_bulk_operation(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let (upload, options) = read_upload(multipart).await?;
    let handle = state
        .bulk
        .start_operation(&auth.caller(), upload, &options)
        .await?;

    tracing::info!(
        operation_id = handle.operation.id,
        user_id = auth.user_id,
        "Bulk operation accepted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: handle.operation,
        }),
    ))
}

/// GET /api/v1/bulk-operations/{id}
pub async fn get_bulk_operation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(operation_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let operation = state.bulk.get_operation(&auth.caller(), operation_id).await?;
    Ok(Json(DataResponse { data: operation }))
}

/// POST /api/v1/bulk-operations/{id}/cancel
///
/// Request cancellation. Rows in chunks that already started still finish.
pub async fn cancel_bulk_operation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(operation_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let operation = state
        .bulk
        .cancel_operation(&auth.caller(), operation_id)
        .await?;
    Ok(Json(DataResponse { data: operation }))
}

/// POST /api/v1/bulk-operations/{id}/rollback
///
/// Revert a completed or partial operation. Returns 202; the operation
/// reaches `rolled_back` once every applied record is restored.
pub async fn rollback_bulk_operation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(operation_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let handle = state
        .bulk
        .rollback_operation(&auth.caller(), operation_id)
        .await?;

    tracing::info!(operation_id, user_id = auth.user_id, "Bulk rollback accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: handle.operation,
        }),
    ))
}

/// GET /api/v1/bulk-operations/{id}/report
///
/// Per-row outcome report as a CSV attachment.
pub async fn download_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(operation_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (file_name, csv) = state
        .bulk
        .generate_report(&auth.caller(), operation_id)
        .await?;
    Ok(csv_attachment(file_name, csv))
}

/// GET /api/v1/bulk-operations/{id}/export
///
/// Canonical data of the rows an export operation found.
pub async fn download_export(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(operation_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (file_name, csv) = state.bulk.export_csv(&auth.caller(), operation_id).await?;
    Ok(csv_attachment(file_name, csv))
}
