use mediasync_core::{MediaDocument, TransformationJobInput};

/// Protects descriptive metadata on updates that carry no file, and prepares a
/// transformation job when only the transformation list changed.
#[derive(Clone)]
pub struct AttributeGuard {
    collection: String,
}

impl AttributeGuard {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    /// Runs before an update without a file is persisted.
    ///
    /// Returns the transformation job to queue once the update is persisted.
    #[tracing::instrument(skip(self, doc, previous_doc), fields(collection = %self.collection, id = %doc.id))]
    pub fn guard_update(
        &self,
        doc: &mut MediaDocument,
        previous_doc: &MediaDocument,
    ) -> Option<TransformationJobInput> {
        doc.filesize = previous_doc.filesize;
        doc.width = previous_doc.width;
        doc.height = previous_doc.height;
        doc.mime_type = previous_doc.mime_type.clone();

        // Only an asset that is still the one the previous document points at
        // can be transformed.
        if doc.public_id.is_none()
            || doc.public_id != previous_doc.public_id
            || doc.raw_transformations == previous_doc.raw_transformations
        {
            return None;
        }

        tracing::debug!(
            public_id = ?doc.public_id,
            steps = doc.raw_transformations.len(),
            "Transformations changed"
        );

        Some(TransformationJobInput {
            collection: self.collection.clone(),
            doc: doc.clone(),
            previous_doc: Some(previous_doc.clone()),
        })
    }
}
