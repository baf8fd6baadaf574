//! Gateway, job queue and plugin wiring

use anyhow::{Context, Result};
use mediasync_core::constants::TRANSFORMATION_QUEUE;
use mediasync_core::Config;
use mediasync_engine::{MediaSyncOptions, MediaSyncPlugin};
use mediasync_gateway::{create_gateway, MediaGateway};
use mediasync_worker::{JobQueue, TaskHandlerContext, TaskQueue, TaskQueueConfig};
use std::sync::Arc;
use std::time::Duration;

use super::database::Repositories;
use crate::state::AppState;

/// Build the application state and start the background worker pool.
pub async fn initialize_services(
    config: &Config,
    repositories: Repositories,
) -> Result<Arc<AppState>> {
    let gateway = if config.enabled {
        Some(create_gateway(&config.gateway).context("Failed to create media gateway")?)
    } else {
        None
    };

    let state = build_state(config, gateway, repositories)?;

    state.task_queue.start().await;

    Ok(state)
}

/// Assemble [`AppState`] around an already constructed gateway.
///
/// The plugin is registered only when a gateway is given. The task queue gets
/// the returned state as its handler context but is not started.
pub fn build_state(
    config: &Config,
    gateway: Option<Arc<dyn MediaGateway>>,
    repositories: Repositories,
) -> Result<Arc<AppState>> {
    let task_queue = TaskQueue::new(
        repositories.tasks.clone(),
        TaskQueueConfig {
            max_workers: config.task_queue_max_workers,
            poll_interval_ms: config.task_queue_poll_interval_ms,
            queues: vec![TRANSFORMATION_QUEUE.to_string()],
        },
    );

    let plugin = match gateway {
        Some(gateway) => {
            let jobs: Arc<dyn JobQueue> = Arc::new(task_queue.clone());
            MediaSyncPlugin::register(
                &MediaSyncOptions::from_config(config),
                gateway,
                repositories.media.clone(),
                jobs,
            )
        }
        None => MediaSyncPlugin::disabled(),
    };

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.gateway.timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let state = Arc::new(AppState {
        config: config.clone(),
        plugin,
        media: repositories.media,
        tasks: repositories.tasks,
        task_queue,
        db_pool: repositories.pool,
        http_client,
    });

    let context: Arc<dyn TaskHandlerContext> = state.clone();
    state.task_queue.set_context(Arc::downgrade(&context));

    tracing::info!(
        collections = ?state.plugin.collections(),
        max_workers = config.task_queue_max_workers,
        "Services initialized"
    );

    Ok(state)
}
