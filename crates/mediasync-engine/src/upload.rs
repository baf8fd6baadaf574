//! Upload reconciliation
//!
//! Runs once per write that carries a file. The in-flight document is only
//! mutated after the remote upload succeeded, so a failed upload leaves nothing
//! to persist. The transformation job and the removal of the superseded asset
//! wait until the document is persisted; see [`PendingChange`].

use mediasync_core::mime::{extension_from_filename, extension_from_mime_type, file_stem};
use mediasync_core::{
    IncomingFile, MediaDocument, ProcessingState, TransformationJobInput, WriteOperation,
};
use mediasync_db::MediaRepository;
use mediasync_gateway::{MediaGateway, ResourceDescriptor, UploadResponse};
use std::sync::Arc;

use crate::adapter::PendingChange;
use crate::error::{EngineError, EngineResult};

#[derive(Clone)]
pub struct UploadReconciler {
    collection: String,
    gateway: Arc<dyn MediaGateway>,
    media: Arc<dyn MediaRepository>,
}

impl UploadReconciler {
    pub fn new(
        collection: impl Into<String>,
        gateway: Arc<dyn MediaGateway>,
        media: Arc<dyn MediaRepository>,
    ) -> Self {
        Self {
            collection: collection.into(),
            gateway,
            media,
        }
    }

    /// Upload `file` and attach the resulting remote asset to `doc`.
    ///
    /// On update, `doc.public_id` must still name the asset being replaced.
    #[tracing::instrument(
        skip(self, doc, file),
        fields(collection = %self.collection, filename = %file.filename, public_id = ?doc.public_id)
    )]
    pub async fn handle_upload(
        &self,
        operation: WriteOperation,
        doc: &mut MediaDocument,
        file: &IncomingFile,
    ) -> EngineResult<PendingChange> {
        let previous_doc = self.previous_doc(operation, doc).await?;

        let uploaded = self.gateway.upload(file).await?;

        Self::merge_upload(doc, file, uploaded);

        let superseded = previous_doc
            .clone()
            .filter(|previous| previous.public_id != doc.public_id);

        tracing::debug!(public_id = ?doc.public_id, "Upload reconciled");

        Ok(PendingChange {
            job: Some(TransformationJobInput {
                collection: self.collection.clone(),
                doc: doc.clone(),
                previous_doc,
            }),
            uploaded: Some(ResourceDescriptor::from(&*doc)),
            superseded,
        })
    }

    async fn previous_doc(
        &self,
        operation: WriteOperation,
        doc: &MediaDocument,
    ) -> EngineResult<Option<MediaDocument>> {
        if operation != WriteOperation::Update {
            return Ok(None);
        }

        let public_id = doc.public_id.as_deref().ok_or_else(|| {
            EngineError::Reconciliation(
                "Replacing a file on a document that was never uploaded".to_string(),
            )
        })?;

        self.media
            .find_one_by_public_id(&self.collection, public_id)
            .await?
            .map(Some)
            .ok_or_else(|| {
                EngineError::Reconciliation(format!(
                    "Failed to find previous document with publicId {}",
                    public_id
                ))
            })
    }

    fn merge_upload(doc: &mut MediaDocument, file: &IncomingFile, uploaded: UploadResponse) {
        doc.filename = Some(file.filename.clone());
        doc.mime_type = Some(file.mime_type.clone());

        doc.custom_filename = doc
            .custom_filename
            .take()
            .filter(|name| !name.is_empty())
            .or_else(|| Some(file_stem(&file.filename).to_string()));

        doc.format = uploaded
            .format
            .filter(|f| !f.is_empty())
            .or_else(|| extension_from_mime_type(doc.mime_type.as_deref()))
            .or_else(|| extension_from_filename(doc.filename.as_deref()));

        doc.filesize = Some(uploaded.bytes);
        doc.width = uploaded.width;
        doc.height = uploaded.height;
        doc.public_id = Some(uploaded.public_id);
        doc.resource_type = uploaded.resource_type;
        doc.url = Some(uploaded.secure_url);
        doc.raw_transformations.clear();
        doc.apply_processing_state(ProcessingState::BUSY);
    }

    /// Drop the asset a persisted replacement no longer points at.
    pub(crate) async fn delete_superseded(&self, previous: &MediaDocument) {
        if let Err(e) = self
            .gateway
            .delete(&ResourceDescriptor::from(previous), true)
            .await
        {
            tracing::error!(
                error = %e,
                public_id = ?previous.public_id,
                "Failed to delete superseded remote asset"
            );
        }
    }

    /// Drop an uploaded asset whose document was never persisted.
    pub(crate) async fn discard_upload(&self, uploaded: &ResourceDescriptor) {
        match self.gateway.delete(uploaded, true).await {
            Ok(()) => tracing::info!(
                public_id = ?uploaded.public_id,
                "Removed remote asset of unpersisted document"
            ),
            Err(e) => tracing::error!(
                error = %e,
                public_id = ?uploaded.public_id,
                "Failed to remove remote asset of unpersisted document"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{png_file, uploaded_document, Fixture, InjectedFailure};
    use uuid::Uuid;

    fn reconciler(fx: &Fixture) -> UploadReconciler {
        UploadReconciler::new("media", fx.gateway.clone(), fx.media.clone())
    }

    #[tokio::test]
    async fn test_create_derives_format_from_mime_and_prepares_job() {
        let fx = Fixture::new();
        let mut doc = MediaDocument::new(Uuid::new_v4());

        let pending = reconciler(&fx)
            .handle_upload(WriteOperation::Create, &mut doc, &png_file("photo.png"))
            .await
            .unwrap();

        assert_eq!(doc.format.as_deref(), Some("png"));
        assert_eq!(doc.custom_filename.as_deref(), Some("photo"));
        assert!(doc.public_id.is_some());
        assert!(doc.is_processing);
        assert!(!doc.has_errors);

        let job = pending.job().unwrap();
        assert_eq!(job.doc, doc);
        assert!(job.previous_doc.is_none());
        assert_eq!(job.collection, "media");
        assert!(pending.superseded.is_none());
        assert_eq!(
            pending.uploaded.as_ref().and_then(|u| u.public_id.clone()),
            doc.public_id
        );
        // Nothing is queued or deleted before the document is persisted.
        assert_eq!(fx.jobs.enqueued_count(), 0);
        assert!(fx.gateway.deleted_ids().is_empty());
    }

    #[tokio::test]
    async fn test_format_falls_back_to_filename_extension() {
        let fx = Fixture::new();
        let mut doc = MediaDocument::new(Uuid::new_v4());
        let file = IncomingFile::new(
            "scan.tiff",
            "application/x-unknown-thing",
            bytes::Bytes::from_static(b"II*"),
        );

        let _ = reconciler(&fx)
            .handle_upload(WriteOperation::Create, &mut doc, &file)
            .await
            .unwrap();
        assert_eq!(doc.format.as_deref(), Some("tiff"));
    }

    #[tokio::test]
    async fn test_gateway_format_wins() {
        let fx = Fixture::new();
        *fx.gateway.response_format.lock().unwrap() = Some("webp".to_string());
        let mut doc = MediaDocument::new(Uuid::new_v4());

        let _ = reconciler(&fx)
            .handle_upload(WriteOperation::Create, &mut doc, &png_file("photo.png"))
            .await
            .unwrap();
        assert_eq!(doc.format.as_deref(), Some("webp"));
    }

    #[tokio::test]
    async fn test_custom_filename_is_kept() {
        let fx = Fixture::new();
        let mut doc = MediaDocument::new(Uuid::new_v4());
        doc.custom_filename = Some("Holiday".to_string());

        let _ = reconciler(&fx)
            .handle_upload(WriteOperation::Create, &mut doc, &png_file("photo.png"))
            .await
            .unwrap();
        assert_eq!(doc.custom_filename.as_deref(), Some("Holiday"));
    }

    #[tokio::test]
    async fn test_replace_resets_transformations_and_marks_old_asset_superseded() {
        let fx = Fixture::new();
        let mut stored = uploaded_document("uploads/old");
        stored.raw_transformations = vec!["c_crop,w_10,h_10".to_string()];
        fx.media.insert("media", &stored).await.unwrap();

        let mut doc = stored.clone();
        let pending = reconciler(&fx)
            .handle_upload(WriteOperation::Update, &mut doc, &png_file("new.png"))
            .await
            .unwrap();

        assert!(doc.raw_transformations.is_empty());
        assert_ne!(doc.public_id.as_deref(), Some("uploads/old"));
        assert_eq!(
            pending.superseded.as_ref().and_then(|d| d.public_id.clone()),
            Some("uploads/old".to_string())
        );
        assert_eq!(
            pending
                .job()
                .and_then(|job| job.previous_doc.as_ref())
                .and_then(|d| d.public_id.clone()),
            Some("uploads/old".to_string())
        );
        assert!(fx.gateway.deleted_ids().is_empty());
    }

    #[tokio::test]
    async fn test_replace_with_same_public_id_supersedes_nothing() {
        let fx = Fixture::new();
        let stored = uploaded_document("uploads/same");
        fx.media.insert("media", &stored).await.unwrap();
        fx.gateway.set_public_id("uploads/same");

        let mut doc = stored.clone();
        let pending = reconciler(&fx)
            .handle_upload(WriteOperation::Update, &mut doc, &png_file("photo.png"))
            .await
            .unwrap();
        assert!(pending.superseded.is_none());
    }

    #[tokio::test]
    async fn test_replace_without_previous_doc_is_reconciliation_error() {
        let fx = Fixture::new();
        let mut doc = uploaded_document("uploads/ghost");

        let err = reconciler(&fx)
            .handle_upload(WriteOperation::Update, &mut doc, &png_file("photo.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Reconciliation(_)));
        assert_eq!(fx.gateway.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_doc_untouched() {
        let fx = Fixture::new();
        fx.gateway
            .fail_uploads_with(InjectedFailure::Quota("quota exceeded".to_string()));
        let mut doc = MediaDocument::new(Uuid::new_v4());
        let before = doc.clone();

        let err = reconciler(&fx)
            .handle_upload(WriteOperation::Create, &mut doc, &png_file("photo.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Gateway(_)));
        assert_eq!(doc, before);
    }

    #[tokio::test]
    async fn test_failed_superseded_delete_is_swallowed() {
        let fx = Fixture::new();
        fx.gateway
            .fail_deletes_with(InjectedFailure::Network("connection reset".to_string()));

        reconciler(&fx)
            .delete_superseded(&uploaded_document("uploads/old"))
            .await;

        assert_eq!(fx.gateway.deleted_ids(), vec![Some("uploads/old".to_string())]);
        assert!(fx.gateway.deletes.lock().unwrap()[0].1);
    }
}
