//! Mediasync DB Library
//!
//! Repositories for media documents and background tasks. Each repository is a
//! trait with a PostgreSQL implementation and an in-memory one used when no
//! database is configured and by tests.

pub mod db;

pub use db::{
    InMemoryMediaRepository, InMemoryTaskRepository, MediaRepository, PgMediaRepository,
    PgTaskRepository, TaskRepository,
};
