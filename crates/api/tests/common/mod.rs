#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use syncbridge_api::auth::jwt::{generate_access_token, JwtConfig};
use syncbridge_api::config::ServerConfig;
use syncbridge_api::router::build_app_router;
use syncbridge_api::state::AppState;
use syncbridge_connectors::RestConnectorFactory;
use syncbridge_events::EventBus;
use syncbridge_pipeline::{MemoryStores, PipelineConfig};
use tower::ServiceExt;

pub const TENANT: i64 = 1;
pub const USER: i64 = 7;
const BOUNDARY: &str = "syncbridge-test-boundary";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        pipeline: PipelineConfig::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub stores: Arc<MemoryStores>,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// The production router over in-memory stores.
pub fn build_test_app() -> TestApp {
    let stores = Arc::new(MemoryStores::new());
    let state = AppState::new(
        stores.clone(),
        Arc::new(RestConnectorFactory::new()),
        Arc::new(EventBus::default()),
        test_config(),
    );
    TestApp {
        router: build_app_router(state),
        stores,
    }
}

pub fn token_for(user_id: i64, tenant_id: Option<i64>) -> String {
    generate_access_token(user_id, tenant_id, "operator", &test_config().jwt).unwrap()
}

pub fn token() -> String {
    token_for(USER, Some(TENANT))
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A multipart upload. `None` parts are left out of the body.
pub fn post_upload(
    uri: &str,
    token: &str,
    options: Option<&Value>,
    file: Option<(&str, &str)>,
) -> Request<Body> {
    let mut body = String::new();
    if let Some(options) = options {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"options\"\r\n\r\n{options}\r\n"
        ));
    }
    if let Some((file_name, csv)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n{csv}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
