//! Test helpers: build AppState and router for integration tests.
//!
//! Documents and tasks live in memory; the remote media service is either the
//! engine's `MockGateway` or the HTTP gateway pointed at a mockito server.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use mediasync_api::setup::database::Repositories;
use mediasync_api::setup::{routes, services};
use mediasync_api::AppState;
use mediasync_core::Config;
use mediasync_engine::test_helpers::MockGateway;
use mediasync_gateway::MediaGateway;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub const COLLECTION: &str = "media";

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Configuration with credentials plus `overrides`.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut values: HashMap<String, String> = [
        ("CLOUDINARY_CLOUD_NAME", "demo"),
        ("CLOUDINARY_API_KEY", "key"),
        ("CLOUDINARY_API_SECRET", "secret"),
        ("MEDIASYNC_COLLECTIONS", "media,avatars"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        values.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| values.get(key).cloned()).expect("Failed to build test config")
}

pub fn build_app(config: Config, gateway: Option<Arc<dyn MediaGateway>>) -> TestApp {
    let state = services::build_state(&config, gateway, Repositories::in_memory())
        .expect("Failed to build app state");
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");
    TestApp { server, state }
}

/// App backed by a [`MockGateway`].
pub fn setup_test_app() -> (TestApp, Arc<MockGateway>) {
    let gateway = Arc::new(MockGateway::new());
    let shared: Arc<dyn MediaGateway> = gateway.clone();
    let app = build_app(test_config(&[]), Some(shared));
    (app, gateway)
}

pub fn png_part(filename: &str) -> Part {
    Part::bytes(bytes::Bytes::from_static(b"\x89PNG\r\n\x1a\nfake-image-data"))
        .file_name(filename.to_string())
        .mime_type("image/png")
}

pub fn upload_form(filename: &str) -> MultipartForm {
    MultipartForm::new().add_part("file", png_part(filename))
}

pub async fn upload(client: &TestServer, filename: &str) -> serde_json::Value {
    let response = client
        .post(&format!("/api/{}", COLLECTION))
        .multipart(upload_form(filename))
        .await;
    assert_eq!(response.status_code(), 201);
    response.json()
}

/// Poll `condition` every 20ms until it holds or `timeout_ms` elapses.
pub async fn wait_for_condition<F, Fut>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut waited = 0;
    while waited < timeout_ms {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
        waited += 20;
    }
    condition().await
}
