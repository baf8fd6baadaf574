//! Task handler context trait
//!
//! The API implements this trait for its application state. The worker calls
//! `dispatch_task` when processing a task; the implementation matches on task
//! type and invokes the appropriate handler.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use mediasync_core::models::Task;

/// Context for task dispatch.
///
/// The worker holds a weak reference so the application state can own the queue.
#[async_trait]
pub trait TaskHandlerContext: Send + Sync {
    /// Dispatch a task to the appropriate handler and return the result.
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value>;
}

struct NoopContext;

#[async_trait]
impl TaskHandlerContext for NoopContext {
    async fn dispatch_task(self: Arc<Self>, _task: &Task) -> Result<serde_json::Value> {
        Err(anyhow!("No handler context available"))
    }
}

/// A context that is already dropped. Placeholder until the real state exists.
pub fn empty_context_weak() -> Weak<dyn TaskHandlerContext> {
    let n: Arc<dyn TaskHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}
