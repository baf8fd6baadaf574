//! Collection API integration tests.
//!
//! Run with: `cargo test -p mediasync-api --test media_test`

mod helpers;

use axum_test::multipart::MultipartForm;
use helpers::{build_app, setup_test_app, test_config, upload, upload_form, wait_for_condition};
use mediasync_engine::test_helpers::InjectedFailure;
use serde_json::json;

#[tokio::test]
async fn test_create_uploads_and_projects_document() {
    let (app, gateway) = setup_test_app();

    let doc = upload(app.client(), "photo.png").await;

    assert_eq!(gateway.upload_count(), 1);
    assert_eq!(doc["publicId"], "uploads/photo-0");
    assert_eq!(doc["filename"], "photo.png");
    assert_eq!(doc["customFilename"], "photo");
    assert_eq!(doc["format"], "png");
    assert_eq!(doc["mimeType"], "image/png");
    assert_eq!(doc["width"], 1000);
    assert_eq!(doc["isProcessing"], true);
    assert_eq!(doc["hasErrors"], false);
    assert!(doc["secureURL"]
        .as_str()
        .is_some_and(|url| url.ends_with("/demo/image/upload/uploads/photo-0.png")));
    assert!(doc["downloadURL"]
        .as_str()
        .is_some_and(|url| url.contains("fl_attachment")));
    assert!(doc["thumbnailURL"].as_str().is_some());
}

#[tokio::test]
async fn test_create_keeps_provided_custom_filename() {
    let (app, _gateway) = setup_test_app();

    let form = upload_form("photo.png").add_text("data", json!({"customFilename": "holiday"}).to_string());
    let response = app.client().post("/api/media").multipart(form).await;

    assert_eq!(response.status_code(), 201);
    let doc: serde_json::Value = response.json();
    assert_eq!(doc["customFilename"], "holiday");
}

#[tokio::test]
async fn test_transformation_job_clears_processing_flag() {
    let (app, gateway) = setup_test_app();
    let doc = upload(app.client(), "photo.png").await;
    let path = format!("/api/media/{}", doc["id"].as_str().unwrap());

    let client = app.client();
    let path = path.as_str();
    let settled = wait_for_condition(
        || async move {
            let current: serde_json::Value = client.get(path).await.json();
            current["isProcessing"] == false
        },
        2000,
    )
    .await;

    assert!(settled);
    assert_eq!(gateway.apply_count(), 1);
    let current: serde_json::Value = client.get(path).await.json();
    assert_eq!(current["hasErrors"], false);
}

#[tokio::test]
async fn test_failed_transformation_sets_has_errors() {
    let (app, gateway) = setup_test_app();
    gateway.fail_transformations_with(InjectedFailure::Quota("quota exceeded".to_string()));
    let doc = upload(app.client(), "photo.png").await;
    let path = format!("/api/media/{}", doc["id"].as_str().unwrap());

    let client = app.client();
    let path = path.as_str();
    let flagged = wait_for_condition(
        || async move {
            let current: serde_json::Value = client.get(path).await.json();
            current["hasErrors"] == true && current["isProcessing"] == false
        },
        2000,
    )
    .await;

    assert!(flagged);
}

#[tokio::test]
async fn test_upload_failure_aborts_the_write() {
    let (app, gateway) = setup_test_app();
    gateway.fail_uploads_with(InjectedFailure::Network("connection reset".to_string()));

    let response = app.client().post("/api/media").multipart(upload_form("photo.png")).await;

    assert_eq!(response.status_code(), 502);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "GATEWAY_ERROR");

    let list: serde_json::Value = app.client().get("/api/media").await.json();
    assert!(list["docs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_without_file_is_rejected() {
    let (app, gateway) = setup_test_app();
    let form = MultipartForm::new().add_text("data", json!({"customFilename": "x"}).to_string());

    let response = app.client().post("/api/media").multipart(form).await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(gateway.upload_count(), 0);
}

#[tokio::test]
async fn test_update_without_file_restores_metadata_and_queues_transformations() {
    let (app, gateway) = setup_test_app();
    let doc = upload(app.client(), "photo.png").await;
    let path = format!("/api/media/{}", doc["id"].as_str().unwrap());

    let response = app
        .client()
        .patch(&path)
        .json(&json!({
            "width": 5,
            "filesize": 1,
            "customFilename": "renamed",
            "rawTransformations": ["e_sepia"]
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let updated: serde_json::Value = response.json();
    assert_eq!(updated["width"], 1000);
    assert_eq!(updated["filesize"], doc["filesize"]);
    assert_eq!(updated["customFilename"], "renamed");
    assert_eq!(updated["rawTransformations"], json!(["e_sepia"]));
    assert!(updated["secureURL"]
        .as_str()
        .is_some_and(|url| url.contains("/upload/e_sepia/")));
    assert_eq!(gateway.upload_count(), 1);

    let applied = wait_for_condition(
        || {
            let done = gateway
                .applied
                .lock()
                .unwrap()
                .iter()
                .any(|(_, chain)| chain == &vec!["e_sepia".to_string()]);
            async move { done }
        },
        2000,
    )
    .await;
    assert!(applied);
}

#[tokio::test]
async fn test_update_with_file_replaces_remote_asset() {
    let (app, gateway) = setup_test_app();
    let doc = upload(app.client(), "photo.png").await;
    let path = format!("/api/media/{}", doc["id"].as_str().unwrap());

    let response = app.client().patch(&path).multipart(upload_form("other.png")).await;

    assert_eq!(response.status_code(), 200);
    let updated: serde_json::Value = response.json();
    assert_eq!(updated["id"], doc["id"]);
    assert_eq!(updated["publicId"], "uploads/other-1");
    assert_eq!(updated["filename"], "other.png");
    assert_eq!(gateway.upload_count(), 2);
    assert_eq!(gateway.deleted_ids(), vec![Some("uploads/photo-0".to_string())]);
}

#[tokio::test]
async fn test_delete_removes_document_and_remote_asset() {
    let (app, gateway) = setup_test_app();
    let doc = upload(app.client(), "photo.png").await;
    let path = format!("/api/media/{}", doc["id"].as_str().unwrap());

    let response = app.client().delete(&path).await;
    assert_eq!(response.status_code(), 204);
    assert_eq!(gateway.deleted_ids(), vec![Some("uploads/photo-0".to_string())]);
    assert!(gateway.deletes.lock().unwrap()[0].1);

    assert_eq!(app.client().get(&path).await.status_code(), 404);
}

#[tokio::test]
async fn test_delete_survives_remote_failure() {
    let (app, gateway) = setup_test_app();
    let doc = upload(app.client(), "photo.png").await;
    gateway.fail_deletes_with(InjectedFailure::Network("timeout".to_string()));
    let path = format!("/api/media/{}", doc["id"].as_str().unwrap());

    assert_eq!(app.client().delete(&path).await.status_code(), 204);
    assert_eq!(app.client().get(&path).await.status_code(), 404);
}

#[tokio::test]
async fn test_list_is_paginated() {
    let (app, _gateway) = setup_test_app();
    upload(app.client(), "one.png").await;
    upload(app.client(), "two.png").await;

    let all: serde_json::Value = app.client().get("/api/media").await.json();
    assert_eq!(all["docs"].as_array().unwrap().len(), 2);

    let first: serde_json::Value = app.client().get("/api/media?limit=1&page=1").await.json();
    assert_eq!(first["docs"].as_array().unwrap().len(), 1);
    assert_eq!(first["limit"], 1);

    let other: serde_json::Value = app.client().get("/api/avatars").await.json();
    assert!(other["docs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_collection_is_not_found() {
    let (app, _gateway) = setup_test_app();

    let response = app.client().get("/api/posts").await;
    assert_eq!(response.status_code(), 404);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_collection_fields() {
    let (app, _gateway) = setup_test_app();

    let response = app.client().get("/api/media/fields").await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["gateway"], "mock");
    assert_eq!(body["fields"].as_array().unwrap().len(), 9);
    assert_eq!(body["upload"]["disableLocalStorage"], true);
    assert_eq!(body["upload"]["crop"], false);
}

#[tokio::test]
async fn test_disabled_plugin_serves_no_collection() {
    let app = build_app(test_config(&[("MEDIASYNC_ENABLED", "false")]), None);

    assert_eq!(app.client().get("/api/media").await.status_code(), 404);
    assert!(!app.state.plugin.is_enabled());
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _gateway) = setup_test_app();

    let live: serde_json::Value = app.client().get("/health").await.json();
    assert_eq!(live["status"], "alive");

    let response = app.client().get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
    let ready: serde_json::Value = response.json();
    assert_eq!(ready["database"], "in_memory");
    assert_eq!(ready["collections"], json!(["avatars", "media"]));
    assert_eq!(ready["pending_tasks"], 0);
}
