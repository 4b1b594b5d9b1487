//! `/api/v1/sync-jobs` endpoints and authentication.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{json, Value};

fn job_body(integration_id: i64) -> Value {
    json!({
        "integration_id": integration_id,
        "entity_types": ["products", "customers"],
        "sync_mode": "pull",
        "priority": "high"
    })
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = build_test_app();
    let request = axum::http::Request::builder()
        .uri("/api/v1/sync-jobs/1")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Missing Authorization header");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = build_test_app();
    let response = app.send(get("/api/v1/sync-jobs/1", "not-a-jwt")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid or expired token");
}

#[tokio::test]
async fn tenantless_token_is_forbidden() {
    let app = build_test_app();
    let integration = app.stores.add_integration(TENANT, "shopify", json!({}));

    let response = app
        .send(post_json("/api/v1/sync-jobs", &token_for(USER, None), &job_body(integration.id)))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.stores.job_count(), 0);
}

// ---------------------------------------------------------------------------
// Create / get / cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_queued_job() {
    let app = build_test_app();
    let integration = app.stores.add_integration(TENANT, "shopify", json!({}));

    let response = app
        .send(post_json("/api/v1/sync-jobs", &token(), &job_body(integration.id)))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let job = &body_json(response).await["data"];
    assert_eq!(job["status_id"], 2);
    assert_eq!(job["tenant_id"], TENANT);
    assert_eq!(job["priority"], "high");
    assert_eq!(job["entity_types"], json!(["products", "customers"]));
    assert_eq!(app.stores.queue_len(), 1);
}

#[tokio::test]
async fn foreign_integration_is_forbidden() {
    let app = build_test_app();
    let foreign = app.stores.add_integration(99, "shopify", json!({}));

    let response = app
        .send(post_json("/api/v1/sync-jobs", &token(), &job_body(foreign.id)))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
    assert_eq!(app.stores.job_count(), 0);
}

#[tokio::test]
async fn invalid_config_is_a_validation_error() {
    let app = build_test_app();
    let integration = app.stores.add_integration(TENANT, "shopify", json!({}));

    let response = app
        .send(post_json(
            "/api/v1/sync-jobs",
            &token(),
            &json!({"integration_id": integration.id, "entity_types": []}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "At least one entity type is required");
}

#[tokio::test]
async fn get_is_tenant_scoped() {
    let app = build_test_app();
    let integration = app.stores.add_integration(TENANT, "shopify", json!({}));
    let created = body_json(
        app.send(post_json("/api/v1/sync-jobs", &token(), &job_body(integration.id)))
            .await,
    )
    .await;
    let uri = format!("/api/v1/sync-jobs/{}", created["data"]["id"]);

    let response = app.send(get(&uri, &token())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["id"], created["data"]["id"]);

    let response = app.send(get(&uri, &token_for(USER, Some(2)))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_twice_conflicts() {
    let app = build_test_app();
    let integration = app.stores.add_integration(TENANT, "shopify", json!({}));
    let created = body_json(
        app.send(post_json("/api/v1/sync-jobs", &token(), &job_body(integration.id)))
            .await,
    )
    .await;
    let uri = format!("/api/v1/sync-jobs/{}/cancel", created["data"]["id"]);

    let response = app.send(post(&uri, &token())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status_id"], 6);

    let response = app.send(post(&uri, &token())).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Connector cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalidate_connector_requires_owned_integration() {
    let app = build_test_app();
    let own = app.stores.add_integration(TENANT, "shopify", json!({}));
    let foreign = app.stores.add_integration(99, "shopify", json!({}));

    let response = app
        .send(delete(&format!("/api/v1/integrations/{}/connector", own.id), &token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["integration_id"], own.id);
    assert_eq!(json["data"]["evicted"], false);

    let response = app
        .send(delete(&format!("/api/v1/integrations/{}/connector", foreign.id), &token()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
