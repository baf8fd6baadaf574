//! Background task queue for mediasync.
//!
//! Tasks are persisted through a [`mediasync_db::TaskRepository`] and dispatched
//! to a [`TaskHandlerContext`] implemented by the API's application state.

pub mod context;
pub mod queue;

pub use context::{empty_context_weak, TaskHandlerContext};
pub use queue::{JobQueue, TaskQueue, TaskQueueConfig};
