//! `/api/v1/bulk-operations` endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::*;
use serde_json::{json, Value};

const PRODUCTS: &str = "sku,name,price\nSKU-1,Widget,9.50\nSKU-2,Gadget,oops\nSKU-3,Gizmo,3\n";

fn import_options() -> Value {
    json!({"operation_type": "import", "entity_type": "products"})
}

async fn upload(app: &TestApp, options: &Value, csv: &str) -> Value {
    let response = app
        .send(post_upload(
            "/api/v1/bulk-operations",
            &token(),
            Some(options),
            Some(("products.csv", csv)),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await["data"].clone()
}

/// Poll until the operation reaches `status_id`.
async fn wait_for_status(app: &TestApp, id: &Value, status_id: i64) -> Value {
    let uri = format!("/api/v1/bulk-operations/{id}");
    for _ in 0..200 {
        let op = body_json(app.send(get(&uri, &token())).await).await["data"].clone();
        if op["status_id"] == status_id {
            return op;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("operation {id} never reached status {status_id}");
}

#[tokio::test]
async fn upload_runs_to_partial_and_reports_rows() {
    let app = build_test_app();

    let accepted = upload(&app, &import_options(), PRODUCTS).await;
    assert_eq!(accepted["total_records"], 3);
    assert_eq!(accepted["file_name"], "products.csv");

    let op = wait_for_status(&app, &accepted["id"], 4).await;
    assert_eq!(op["successful_records"], 2);
    assert_eq!(op["failed_records"], 1);
    assert!(op.get("undo_data").is_none());

    let response = app
        .send(get(&format!("/api/v1/bulk-operations/{}/report", accepted["id"]), &token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
    assert_eq!(
        response.headers()["content-disposition"],
        format!("attachment; filename=\"{}-report.csv\"", accepted["id"]).as_str()
    );
    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.trim_end().split("\r\n").collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[2].starts_with("2,create,failed,"));
}

#[tokio::test]
async fn rollback_is_accepted_and_completes() {
    let app = build_test_app();
    let accepted = upload(&app, &import_options(), "sku,name\nA-1,One\nA-2,Two\n").await;
    wait_for_status(&app, &accepted["id"], 3).await;

    let response = app
        .send(post(&format!("/api/v1/bulk-operations/{}/rollback", accepted["id"]), &token()))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let op = wait_for_status(&app, &accepted["id"], 7).await;
    assert_eq!(op["successful_records"], 0);
    assert_eq!(app.stores.canonical_count(TENANT, "products"), 0);

    let response = app
        .send(post(&format!("/api/v1/bulk-operations/{}/rollback", accepted["id"]), &token()))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn export_download_requires_export_operation() {
    let app = build_test_app();
    let import = upload(&app, &import_options(), "sku,name\nA-1,One\n").await;
    wait_for_status(&app, &import["id"], 3).await;

    let response = app
        .send(get(&format!("/api/v1/bulk-operations/{}/export", import["id"]), &token()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let export = upload(
        &app,
        &json!({"operation_type": "export", "entity_type": "products"}),
        "sku\nA-1\n",
    )
    .await;
    wait_for_status(&app, &export["id"], 3).await;

    let response = app
        .send(get(&format!("/api/v1/bulk-operations/{}/export", export["id"]), &token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "sku,name\r\nA-1,One\r\n");
}

#[tokio::test]
async fn cancelling_finished_operation_conflicts() {
    let app = build_test_app();
    let accepted = upload(&app, &import_options(), "sku\nA-1\n").await;
    wait_for_status(&app, &accepted["id"], 3).await;

    let response = app
        .send(post(&format!("/api/v1/bulk-operations/{}/cancel", accepted["id"]), &token()))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Rejected uploads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_parts_are_bad_requests() {
    let app = build_test_app();

    let response = app
        .send(post_upload("/api/v1/bulk-operations", &token(), None, Some(("a.csv", "sku\nA\n"))))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing multipart part 'options'");

    let response = app
        .send(post_upload("/api/v1/bulk-operations", &token(), Some(&import_options()), None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing multipart part 'file'");
}

#[tokio::test]
async fn invalid_upload_is_a_validation_error() {
    let app = build_test_app();

    let response = app
        .send(post_upload(
            "/api/v1/bulk-operations",
            &token(),
            Some(&import_options()),
            Some(("products.csv", "name\nNo key\n")),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = app
        .send(post_upload(
            "/api/v1/bulk-operations",
            &token(),
            Some(&json!({"operation_type": "merge", "entity_type": "products"})),
            Some(("products.csv", PRODUCTS)),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_tenants_cannot_read_operations() {
    let app = build_test_app();
    let accepted = upload(&app, &import_options(), "sku\nA-1\n").await;

    let response = app
        .send(get(
            &format!("/api/v1/bulk-operations/{}", accepted["id"]),
            &token_for(USER, Some(2)),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
