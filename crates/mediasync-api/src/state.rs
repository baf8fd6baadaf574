//! Application state shared by every handler.

use async_trait::async_trait;
use mediasync_core::models::Task;
use mediasync_core::{AppError, Config};
use mediasync_db::{MediaRepository, TaskRepository};
use mediasync_engine::{MediaSyncAdapter, MediaSyncPlugin};
use mediasync_worker::{TaskHandlerContext, TaskQueue};
use sqlx::PgPool;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub plugin: MediaSyncPlugin,
    pub media: Arc<dyn MediaRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub task_queue: TaskQueue,
    /// Set when documents live in PostgreSQL; probed by the readiness check.
    pub db_pool: Option<PgPool>,
    /// Client used by the static file handler to fetch delivery URLs.
    pub http_client: reqwest::Client,
}

impl AppState {
    /// The adapter registered for `collection`, or 404.
    pub fn adapter(&self, collection: &str) -> Result<Arc<MediaSyncAdapter>, AppError> {
        self.plugin
            .adapter(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))
    }
}

#[async_trait]
impl TaskHandlerContext for AppState {
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> anyhow::Result<serde_json::Value> {
        tracing::debug!(task_id = %task.id, task_type = %task.task_type, "Dispatching task");
        self.plugin.handle_task(task).await
    }
}
