//! Task queue: worker pool, polling, retry, and submission.
//!
//! [`JobQueue::run`] drains a queue in the background and returns immediately.
//! [`TaskQueue::start`] adds a polling loop for tasks left behind by a previous
//! process. [`TaskQueue::shutdown`] stops the polling loop; it does not wait for
//! in-flight tasks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use uuid::Uuid;

use mediasync_core::constants::TRANSFORMATION_QUEUE;
use mediasync_core::models::{Task, TaskType};
use mediasync_db::TaskRepository;

use crate::context::{empty_context_weak, TaskHandlerContext};

/// Submission side of the queue, as seen by the reconciliation engine.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a task on `queue`. Does not start processing.
    async fn enqueue(&self, queue: &str, task_type: TaskType, input: serde_json::Value)
        -> Result<Uuid>;

    /// Start draining `queue` without waiting for the outcome.
    fn run(&self, queue: &str);
}

#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    /// Queues visited by the polling loop.
    pub queues: Vec<String>,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            queues: vec![TRANSFORMATION_QUEUE.to_string()],
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    repository: Arc<dyn TaskRepository>,
    config: TaskQueueConfig,
    context: Arc<RwLock<Weak<dyn TaskHandlerContext>>>,
    semaphore: Arc<Semaphore>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
}

impl TaskQueue {
    /// Create a queue with no handler context. Call [`TaskQueue::set_context`]
    /// once the application state exists; tasks claimed before that fail.
    pub fn new(repository: Arc<dyn TaskRepository>, config: TaskQueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        Self {
            repository,
            config,
            context: Arc::new(RwLock::new(empty_context_weak())),
            semaphore,
            shutdown_tx,
            shutdown_rx: Arc::new(Mutex::new(Some(shutdown_rx))),
        }
    }

    pub fn set_context(&self, context: Weak<dyn TaskHandlerContext>) {
        let mut slot = self
            .context
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = context;
    }

    fn current_context(&self) -> Weak<dyn TaskHandlerContext> {
        self.context
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Spawn the polling loop. Calling it twice has no effect.
    pub async fn start(&self) {
        let Some(mut shutdown_rx) = self.shutdown_rx.lock().await.take() else {
            tracing::debug!("Task queue polling loop already started");
            return;
        };

        let this = self.clone();
        let poll_interval = Duration::from_millis(this.config.poll_interval_ms);

        tracing::info!(
            max_workers = this.config.max_workers,
            poll_interval_ms = this.config.poll_interval_ms,
            queues = ?this.config.queues,
            "Task queue worker pool started"
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Task queue worker pool shutting down");
                        break;
                    }
                    _ = sleep(poll_interval) => {
                        for queue in &this.config.queues {
                            this.drain(queue).await;
                        }
                    }
                }
            }
            tracing::info!("Task queue worker pool stopped");
        });
    }

    /// Claim and process every pending task of `queue`, at most `max_workers`
    /// at a time, and wait for all of them. Returns the number processed.
    pub async fn drain(&self, queue: &str) -> usize {
        let mut running = JoinSet::new();
        let mut processed = 0;

        loop {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("Task queue semaphore closed");
                    break;
                }
            };

            match self.repository.claim_next(queue).await {
                Ok(Some(task)) => {
                    processed += 1;
                    let repository = self.repository.clone();
                    let context = self.current_context();
                    running.spawn(async move {
                        let _permit = permit;
                        if let Err(e) = Self::process_task(task, repository, context).await {
                            tracing::error!(error = %e, "Task processing failed");
                        }
                    });
                }
                Ok(None) => {
                    tracing::trace!(queue = %queue, "No tasks available in queue");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, queue = %queue, "Failed to claim task from queue");
                    break;
                }
            }
        }

        while running.join_next().await.is_some() {}
        processed
    }

    #[tracing::instrument(skip(task, repository, context), fields(task.id = %task.id, task.type = %task.task_type))]
    async fn process_task(
        task: Task,
        repository: Arc<dyn TaskRepository>,
        context: Weak<dyn TaskHandlerContext>,
    ) -> Result<()> {
        let ctx = context.upgrade().ok_or_else(|| {
            anyhow::anyhow!("TaskHandlerContext was dropped, cannot process task")
        });

        let result = match ctx {
            Ok(ctx) => ctx.dispatch_task(&task).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(task_result) => {
                repository
                    .mark_completed(task.id, task_result)
                    .await
                    .context("Failed to mark task as completed")?;
                tracing::info!(task_id = %task.id, "Task completed successfully");
                Ok(())
            }
            Err(e) if task.can_retry() => {
                tracing::warn!(
                    task_id = %task.id,
                    error = %e,
                    retry_count = task.retry_count + 1,
                    "Task failed, scheduling retry"
                );
                repository
                    .increment_retry(task.id)
                    .await
                    .context("Failed to schedule retry")?;
                Ok(())
            }
            Err(e) => {
                let error_result = json!({
                    "error": e.to_string(),
                    "retry_count": task.retry_count,
                    "reason": "Task failed after maximum retries"
                });
                repository
                    .mark_failed(task.id, error_result)
                    .await
                    .context("Failed to mark task as failed")?;
                tracing::error!(task_id = %task.id, error = %e, "Task failed");
                Err(e)
            }
        }
    }

    /// Signal the polling loop to stop.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl JobQueue for TaskQueue {
    #[tracing::instrument(skip(self, input))]
    async fn enqueue(
        &self,
        queue: &str,
        task_type: TaskType,
        input: serde_json::Value,
    ) -> Result<Uuid> {
        let task = Task::new(queue, task_type, input);
        let task = self.repository.create(&task).await.map_err(|e| {
            tracing::error!(error = %e, queue = %queue, task_type = %task_type, "Failed to create task in repository");
            anyhow::anyhow!("Failed to create task in repository: {}", e)
        })?;

        tracing::info!(task_id = %task.id, task_type = %task_type, queue = %queue, "Task submitted to queue");
        Ok(task.id)
    }

    fn run(&self, queue: &str) {
        let this = self.clone();
        let queue = queue.to_string();
        tokio::spawn(async move {
            let processed = this.drain(&queue).await;
            tracing::debug!(queue = %queue, processed, "Queue run finished");
        });
    }
}
