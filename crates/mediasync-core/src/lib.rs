//! Mediasync Core Library
//!
//! Domain models, error types, configuration and MIME helpers shared by every
//! mediasync crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod mime;
pub mod models;

pub use config::{Config, GatewayConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    IncomingFile, MediaDocument, ProcessingState, ResourceType, TransformationJobInput,
    WriteOperation,
};
