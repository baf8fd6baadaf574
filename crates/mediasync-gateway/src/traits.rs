//! Remote media gateway abstraction
//!
//! This module defines the `MediaGateway` trait that every hosting provider
//! integration implements. Gateways are stateless protocol translators.

use async_trait::async_trait;
use mediasync_core::{AppError, IncomingFile, MediaDocument, ResourceType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gateway operation errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GatewayError {
    /// Classify a non-success HTTP status returned by the provider.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => GatewayError::Unauthorized(message),
            404 => GatewayError::NotFound(message),
            420 | 429 => GatewayError::QuotaExceeded(message),
            400..=499 => GatewayError::Rejected(message),
            _ => GatewayError::Network(format!("HTTP {}: {}", status, message)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err.to_string())
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// What the provider reports back after a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub public_id: String,
    #[serde(default)]
    pub format: Option<String>,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    pub bytes: i64,
    pub secure_url: String,
    #[serde(default)]
    pub version: Option<i64>,
}

/// The subset of a document needed to address a remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub public_id: Option<String>,
    pub resource_type: ResourceType,
    pub format: Option<String>,
    pub raw_transformations: Vec<String>,
}

impl From<&MediaDocument> for ResourceDescriptor {
    fn from(doc: &MediaDocument) -> Self {
        Self {
            public_id: doc.public_id.clone(),
            resource_type: doc.resource_type,
            format: doc.format.clone(),
            raw_transformations: doc.raw_transformations.clone(),
        }
    }
}

/// Derived URL flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlVariant {
    /// The transformed asset over https.
    Secure,
    /// Same as `Secure`, served as an attachment.
    Download,
    /// A small preview. Not available for raw resources.
    Thumbnail,
}

/// Gateway to the remote media hosting service.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Upload a file. Nothing may be persisted locally until this succeeds.
    async fn upload(&self, file: &IncomingFile) -> GatewayResult<UploadResponse>;

    /// Delete a remote resource, optionally invalidating CDN caches.
    ///
    /// Callers treat failures as non-fatal.
    async fn delete(&self, resource: &ResourceDescriptor, invalidate: bool) -> GatewayResult<()>;

    /// Compute a delivery URL. Pure; `None` when the resource has no `public_id`
    /// or the variant does not apply.
    fn derive_url(&self, resource: &ResourceDescriptor, variant: UrlVariant) -> Option<String>;

    /// Converge the remote resource with `doc.raw_transformations`.
    async fn apply_transformations(
        &self,
        doc: &MediaDocument,
        previous_doc: Option<&MediaDocument>,
    ) -> GatewayResult<()>;

    /// Gateway identifier used in logs and adapter registration.
    fn name(&self) -> &'static str;
}
