//! Transformation reconciliation job
//!
//! The job input is a snapshot; the live document is looked up again by
//! `publicId` before every state write because it may have changed or been
//! deleted since the job was queued. Gateway failures end up as
//! `hasErrors = true` on the document and never as a job error.

use mediasync_core::{MediaDocument, ProcessingState, TransformationJobInput};
use mediasync_db::MediaRepository;
use mediasync_gateway::MediaGateway;
use std::sync::Arc;

use crate::error::EngineResult;

#[derive(Clone)]
pub struct TransformationReconciler {
    gateway: Arc<dyn MediaGateway>,
    media: Arc<dyn MediaRepository>,
}

impl TransformationReconciler {
    pub fn new(gateway: Arc<dyn MediaGateway>, media: Arc<dyn MediaRepository>) -> Self {
        Self { gateway, media }
    }

    #[tracing::instrument(
        skip(self, input),
        fields(collection = %input.collection, public_id = ?input.doc.public_id)
    )]
    pub async fn reconcile(&self, input: &TransformationJobInput) -> EngineResult<()> {
        match self.converge(input).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if self.mark(input, ProcessingState::FAILED).await? {
                    tracing::error!(
                        error = %e,
                        public_id = ?input.doc.public_id,
                        "Unexpected error while applying transformations"
                    );
                }
                Ok(())
            }
        }
    }

    /// Mark busy, apply, mark done. `Ok(false)` when the document is gone.
    async fn converge(&self, input: &TransformationJobInput) -> EngineResult<bool> {
        if !self.mark(input, ProcessingState::BUSY).await? {
            return Ok(false);
        }

        self.gateway
            .apply_transformations(&input.doc, input.previous_doc.as_ref())
            .await?;

        self.mark(input, ProcessingState::DONE).await
    }

    /// Write `state` on the live document. Returns false when it no longer exists.
    async fn mark(&self, input: &TransformationJobInput, state: ProcessingState) -> EngineResult<bool> {
        let Some(current) = self.locate(input).await? else {
            tracing::warn!(
                public_id = ?input.doc.public_id,
                "Unable to update document as it has been deleted from the database"
            );
            return Ok(false);
        };

        Ok(self
            .media
            .update_processing_state(&input.collection, current.id, state)
            .await?)
    }

    async fn locate(&self, input: &TransformationJobInput) -> EngineResult<Option<MediaDocument>> {
        let Some(public_id) = input.doc.public_id.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .media
            .find_one_by_public_id(&input.collection, public_id)
            .await?)
    }
}
