//! Test doubles for the gateway and the job queue.
//!
//! Enabled inside this crate's tests and, for other crates, through the
//! `test-helpers` feature.

use async_trait::async_trait;
use mediasync_core::mime::file_stem;
use mediasync_core::models::TaskType;
use mediasync_core::{IncomingFile, MediaDocument, ResourceType, TransformationJobInput};
use mediasync_gateway::{
    DeliveryUrlBuilder, GatewayError, GatewayResult, MediaGateway, ResourceDescriptor,
    UploadResponse, UrlVariant,
};
use mediasync_worker::JobQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub use mediasync_db::{InMemoryMediaRepository, InMemoryTaskRepository};

/// Failure injected into the next calls of a [`MockGateway`] operation.
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    Quota(String),
    NotFound(String),
    Network(String),
}

impl InjectedFailure {
    fn to_error(&self) -> GatewayError {
        match self {
            InjectedFailure::Quota(m) => GatewayError::QuotaExceeded(m.clone()),
            InjectedFailure::NotFound(m) => GatewayError::NotFound(m.clone()),
            InjectedFailure::Network(m) => GatewayError::Network(m.clone()),
        }
    }
}

/// In-process gateway recording every call.
pub struct MockGateway {
    urls: DeliveryUrlBuilder,
    counter: AtomicUsize,
    /// Reported `format`; `None` exercises the MIME fallback.
    pub response_format: Mutex<Option<String>>,
    /// Fixed `public_id` for the next uploads instead of a generated one.
    pub fixed_public_id: Mutex<Option<String>>,
    pub uploads: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<(Option<String>, bool)>>,
    pub applied: Mutex<Vec<(Option<String>, Vec<String>)>>,
    pub fail_upload: Mutex<Option<InjectedFailure>>,
    pub fail_delete: Mutex<Option<InjectedFailure>>,
    pub fail_apply: Mutex<Option<InjectedFailure>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            urls: DeliveryUrlBuilder::new("https://res.cloudinary.com", "demo", true),
            counter: AtomicUsize::new(0),
            response_format: Mutex::new(None),
            fixed_public_id: Mutex::new(None),
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            applied: Mutex::new(Vec::new()),
            fail_upload: Mutex::new(None),
            fail_delete: Mutex::new(None),
            fail_apply: Mutex::new(None),
        }
    }

    pub fn fail_uploads_with(&self, failure: InjectedFailure) {
        *self.fail_upload.lock().unwrap() = Some(failure);
    }

    pub fn fail_deletes_with(&self, failure: InjectedFailure) {
        *self.fail_delete.lock().unwrap() = Some(failure);
    }

    pub fn fail_transformations_with(&self, failure: InjectedFailure) {
        *self.fail_apply.lock().unwrap() = Some(failure);
    }

    pub fn set_public_id(&self, public_id: &str) {
        *self.fixed_public_id.lock().unwrap() = Some(public_id.to_string());
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn deleted_ids(&self) -> Vec<Option<String>> {
        self.deletes
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaGateway for MockGateway {
    async fn upload(&self, file: &IncomingFile) -> GatewayResult<UploadResponse> {
        self.uploads.lock().unwrap().push(file.filename.clone());
        if let Some(failure) = self.fail_upload.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let public_id = self
            .fixed_public_id
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("uploads/{}-{}", file_stem(&file.filename), n));

        Ok(UploadResponse {
            public_id,
            format: self.response_format.lock().unwrap().clone(),
            resource_type: ResourceType::from_mime_type(Some(&file.mime_type)),
            width: Some(1000),
            height: Some(800),
            bytes: file.size() as i64,
            secure_url: format!("https://res.cloudinary.com/demo/image/upload/v1/{}", file.filename),
            version: Some(1),
        })
    }

    async fn delete(&self, resource: &ResourceDescriptor, invalidate: bool) -> GatewayResult<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((resource.public_id.clone(), invalidate));
        match self.fail_delete.lock().unwrap().as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn derive_url(&self, resource: &ResourceDescriptor, variant: UrlVariant) -> Option<String> {
        self.urls.build(resource, variant)
    }

    async fn apply_transformations(
        &self,
        doc: &MediaDocument,
        _previous_doc: Option<&MediaDocument>,
    ) -> GatewayResult<()> {
        self.applied
            .lock()
            .unwrap()
            .push((doc.public_id.clone(), doc.raw_transformations.clone()));
        match self.fail_apply.lock().unwrap().as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Job queue that only records what it is asked to do.
#[derive(Default)]
pub struct RecordingJobQueue {
    pub enqueued: Mutex<Vec<(String, TaskType, serde_json::Value)>>,
    pub runs: Mutex<Vec<String>>,
    pub fail_enqueue: Mutex<bool>,
}

impl RecordingJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued_count(&self) -> usize {
        self.enqueued.lock().unwrap().len()
    }

    /// Decoded inputs of every enqueued transformation job, in order.
    pub fn transformation_inputs(&self) -> Vec<TransformationJobInput> {
        self.enqueued
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, task_type, _)| *task_type == TaskType::UpdateTransformations)
            .map(|(_, _, input)| serde_json::from_value(input.clone()).unwrap())
            .collect()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobQueue for RecordingJobQueue {
    async fn enqueue(
        &self,
        queue: &str,
        task_type: TaskType,
        input: serde_json::Value,
    ) -> anyhow::Result<Uuid> {
        if *self.fail_enqueue.lock().unwrap() {
            return Err(anyhow::anyhow!("queue unavailable"));
        }
        self.enqueued
            .lock()
            .unwrap()
            .push((queue.to_string(), task_type, input));
        Ok(Uuid::new_v4())
    }

    fn run(&self, queue: &str) {
        self.runs.lock().unwrap().push(queue.to_string());
    }
}

/// A document as it looks after a successful upload of `photo.png`.
pub fn uploaded_document(public_id: &str) -> MediaDocument {
    let mut doc = MediaDocument::new(Uuid::new_v4());
    doc.filename = Some("photo.png".to_string());
    doc.custom_filename = Some("photo".to_string());
    doc.mime_type = Some("image/png".to_string());
    doc.filesize = Some(2048);
    doc.width = Some(1000);
    doc.height = Some(800);
    doc.public_id = Some(public_id.to_string());
    doc.resource_type = ResourceType::Image;
    doc.format = Some("png".to_string());
    doc.url = Some(format!(
        "https://res.cloudinary.com/demo/image/upload/v1/{}.png",
        public_id
    ));
    doc
}

pub fn png_file(name: &str) -> IncomingFile {
    IncomingFile::new(name, "image/png", bytes::Bytes::from_static(b"\x89PNG\r\n\x1a\n"))
}

/// Gateway, repository and queue doubles wired together.
pub struct Fixture {
    pub gateway: Arc<MockGateway>,
    pub media: Arc<InMemoryMediaRepository>,
    pub jobs: Arc<RecordingJobQueue>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(MockGateway::new()),
            media: Arc::new(InMemoryMediaRepository::new()),
            jobs: Arc::new(RecordingJobQueue::new()),
        }
    }
}
