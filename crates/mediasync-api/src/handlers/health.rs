//! Health check handlers and response types.

use crate::constants::HEALTH_CHECK_TIMEOUT_SECS;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use mediasync_core::constants::TRANSFORMATION_QUEUE;
use mediasync_core::models::TaskStatus;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Run an async check with timeout; returns "ready", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

/// Liveness probe - process is running.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub database: String,
    pub collections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_tasks: Option<i64>,
}

/// Readiness probe - database reachable and task storage readable.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

    let database = match state.db_pool.clone() {
        Some(pool) => {
            run_check(
                timeout,
                async move { sqlx::query("SELECT 1").execute(&pool).await.map(drop) },
                "not_ready",
            )
            .await
        }
        None => "in_memory".to_string(),
    };

    let pending_tasks = match state
        .tasks
        .count_by_status(TRANSFORMATION_QUEUE, TaskStatus::Pending)
        .await
    {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::error!(error = %e, "Task queue readiness check failed");
            None
        }
    };

    let ready = (database == "ready" || database == "in_memory") && pending_tasks.is_some();
    if !ready {
        tracing::warn!(database = %database, "Readiness check failed");
    }

    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        database,
        collections: state
            .plugin
            .collections()
            .into_iter()
            .map(String::from)
            .collect(),
        pending_tasks,
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
