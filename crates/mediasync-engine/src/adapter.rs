//! Per-collection storage adapter and its hooks.

use mediasync_core::constants::TRANSFORMATION_QUEUE;
use mediasync_core::models::TaskType;
use mediasync_core::{
    IncomingFile, MediaDocument, ProcessingState, TransformationJobInput, WriteOperation,
};
use mediasync_db::MediaRepository;
use mediasync_gateway::{MediaGateway, ResourceDescriptor};
use mediasync_worker::JobQueue;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::guard::AttributeGuard;
use crate::projector::{self, ProjectedDocument};
use crate::transformation::TransformationReconciler;
use crate::upload::UploadReconciler;

/// A write about to be persisted.
pub struct ChangeContext<'a> {
    pub operation: WriteOperation,
    /// The in-flight document. Hooks mutate it in place.
    pub doc: &'a mut MediaDocument,
    pub previous_doc: Option<&'a MediaDocument>,
    pub file: Option<&'a IncomingFile>,
}

/// Work left by `before_change` that must wait for the write to settle.
///
/// The transformation job is only queued once its document is persisted.
#[must_use = "hand to `after_change` once persisted, or to `discard`"]
#[derive(Debug, Default)]
pub struct PendingChange {
    pub(crate) job: Option<TransformationJobInput>,
    /// Asset uploaded for this write.
    pub(crate) uploaded: Option<ResourceDescriptor>,
    /// Previous document whose asset the write replaces.
    pub(crate) superseded: Option<MediaDocument>,
}

impl PendingChange {
    pub fn job(&self) -> Option<&TransformationJobInput> {
        self.job.as_ref()
    }
}

/// Why a document's asset is being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKind {
    /// The document itself is deleted.
    Direct,
    /// The file is replaced; cleanup belongs to the upload path.
    Replacement,
}

pub struct MediaSyncAdapter {
    collection: String,
    gateway: Arc<dyn MediaGateway>,
    media: Arc<dyn MediaRepository>,
    jobs: Arc<dyn JobQueue>,
    upload: UploadReconciler,
    guard: AttributeGuard,
    transformations: TransformationReconciler,
}

impl MediaSyncAdapter {
    pub fn new(
        collection: impl Into<String>,
        gateway: Arc<dyn MediaGateway>,
        media: Arc<dyn MediaRepository>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        let collection = collection.into();
        Self {
            upload: UploadReconciler::new(collection.clone(), gateway.clone(), media.clone()),
            guard: AttributeGuard::new(collection.clone()),
            transformations: TransformationReconciler::new(gateway.clone(), media.clone()),
            collection,
            gateway,
            media,
            jobs,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    /// Before-create/update hook.
    pub async fn before_change(&self, ctx: ChangeContext<'_>) -> EngineResult<PendingChange> {
        match (ctx.file, ctx.operation, ctx.previous_doc) {
            (Some(file), operation, _) => {
                self.upload.handle_upload(operation, ctx.doc, file).await
            }
            (None, WriteOperation::Update, Some(previous)) => Ok(PendingChange {
                job: self.guard.guard_update(ctx.doc, previous),
                ..PendingChange::default()
            }),
            (None, _, _) => Ok(PendingChange::default()),
        }
    }

    /// After-create/update hook, called once `doc` is persisted.
    ///
    /// Queues the pending transformation job, drops the superseded asset and
    /// lets the worker pick up queued jobs. When the job cannot be queued the
    /// document is flagged with `hasErrors`, both stored and in `doc`.
    #[tracing::instrument(skip(self, doc, pending), fields(collection = %self.collection, id = %doc.id))]
    pub async fn after_change(&self, doc: &mut MediaDocument, pending: PendingChange) {
        if let Some(job) = pending.job {
            match self.enqueue(&job).await {
                Ok(()) => tracing::debug!(public_id = ?doc.public_id, "Transformation job queued"),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        public_id = ?doc.public_id,
                        "Failed to queue transformation job"
                    );
                    self.flag_unqueued(doc).await;
                }
            }
        }

        if let Some(previous) = pending.superseded {
            self.upload.delete_superseded(&previous).await;
        }

        self.jobs.run(TRANSFORMATION_QUEUE);
    }

    /// Roll back the remote side of a write that failed to persist.
    pub async fn discard(&self, pending: PendingChange) {
        if let Some(uploaded) = pending.uploaded {
            self.upload.discard_upload(&uploaded).await;
        }
    }

    async fn enqueue(&self, job: &TransformationJobInput) -> EngineResult<()> {
        let payload =
            serde_json::to_value(job).map_err(|e| EngineError::Queue(anyhow::anyhow!(e)))?;
        self.jobs
            .enqueue(TRANSFORMATION_QUEUE, TaskType::UpdateTransformations, payload)
            .await
            .map_err(EngineError::Queue)?;
        Ok(())
    }

    async fn flag_unqueued(&self, doc: &mut MediaDocument) {
        doc.apply_processing_state(ProcessingState::FAILED);
        if let Err(e) = self
            .media
            .update_processing_state(&self.collection, doc.id, ProcessingState::FAILED)
            .await
        {
            tracing::error!(error = %e, id = %doc.id, "Failed to flag document");
        }
    }

    /// After-read hook.
    pub fn after_read(&self, doc: MediaDocument) -> ProjectedDocument {
        projector::project(self.gateway.as_ref(), doc)
    }

    pub fn generate_url(&self, doc: &MediaDocument) -> Option<String> {
        projector::generate_url(self.gateway.as_ref(), doc)
    }

    /// Remove the remote asset of a deleted document.
    ///
    /// Only direct deletes are handled; failures are logged.
    #[tracing::instrument(skip(self, doc), fields(collection = %self.collection, public_id = ?doc.public_id))]
    pub async fn handle_delete(&self, doc: &MediaDocument, kind: DeleteKind) {
        if kind != DeleteKind::Direct {
            return;
        }

        if let Err(e) = self
            .gateway
            .delete(&ResourceDescriptor::from(doc), true)
            .await
        {
            tracing::error!(
                error = %e,
                public_id = ?doc.public_id,
                "Failed to delete remote asset"
            );
        }
    }

    pub async fn run_transformation_job(&self, input: &TransformationJobInput) -> EngineResult<()> {
        self.transformations.reconcile(input).await
    }

    /// Download URL of the document stored under `filename`, if any.
    pub async fn download_url_for(&self, filename: &str) -> EngineResult<Option<String>> {
        let doc = self
            .media
            .find_one_by_filename(&self.collection, filename)
            .await?;

        Ok(doc.and_then(|doc| projector::project(self.gateway.as_ref(), doc).download_url))
    }
}
