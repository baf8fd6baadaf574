//! Database repositories for data access layer
//
// Media documents of adapter-managed collections
pub mod media;
//
// Durable background tasks
pub mod task;
//
// In-memory implementations of both repositories
pub mod memory;

pub use media::{MediaRepository, PgMediaRepository};
pub use memory::{InMemoryMediaRepository, InMemoryTaskRepository};
pub use task::{PgTaskRepository, TaskRepository};
