//! Mediasync Engine
//!
//! Keeps media documents and their remote assets consistent:
//!
//! - [`UploadReconciler`] runs when a write carries a file: upload and merge
//!   the response. Queueing the transformation job and dropping the superseded
//!   asset wait for the write to be persisted ([`PendingChange`]).
//! - [`TransformationReconciler`] is the background job converging remote
//!   transformations and recording `isProcessing` / `hasErrors`.
//! - [`AttributeGuard`] protects descriptive metadata on writes without a file.
//! - [`projector`] decorates documents on read.
//!
//! [`MediaSyncAdapter`] wires these into per-collection hooks and
//! [`MediaSyncPlugin`] registers one adapter per configured collection.

pub mod adapter;
pub mod error;
pub mod fields;
pub mod guard;
pub mod plugin;
pub mod projector;
pub mod transformation;
pub mod upload;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use adapter::{ChangeContext, DeleteKind, MediaSyncAdapter, PendingChange};
pub use error::{EngineError, EngineResult};
pub use fields::{adapter_fields, FieldDefinition, FieldType, UploadSettings};
pub use guard::AttributeGuard;
pub use plugin::{MediaSyncOptions, MediaSyncPlugin};
pub use projector::ProjectedDocument;
pub use transformation::TransformationReconciler;
pub use upload::UploadReconciler;
