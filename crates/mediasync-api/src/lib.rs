//! Mediasync API Library
//!
//! The HTTP host for adapter-managed media collections: collection CRUD driving
//! the adapter hooks, the static file handler, health probes and task dispatch
//! for the background job queue.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
