//! In-memory repositories
//!
//! Used when `DATABASE_URL` is unset and throughout the test suites. Contents
//! are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use mediasync_core::models::{Task, TaskStatus};
use mediasync_core::{AppError, MediaDocument, ProcessingState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::media::MediaRepository;
use super::task::TaskRepository;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
}

#[derive(Clone, Default)]
pub struct InMemoryMediaRepository {
    docs: Arc<Mutex<HashMap<Uuid, (String, MediaDocument)>>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_oldest<F>(&self, collection: &str, pred: F) -> Result<Option<MediaDocument>, AppError>
    where
        F: Fn(&MediaDocument) -> bool,
    {
        let docs = lock(&self.docs)?;
        Ok(docs
            .values()
            .filter(|(c, doc)| c == collection && pred(doc))
            .map(|(_, doc)| doc)
            .min_by_key(|doc| doc.created_at)
            .cloned())
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn insert(
        &self,
        collection: &str,
        doc: &MediaDocument,
    ) -> Result<MediaDocument, AppError> {
        let mut docs = lock(&self.docs)?;
        if docs.contains_key(&doc.id) {
            return Err(AppError::BadRequest(format!(
                "Document {} already exists",
                doc.id
            )));
        }
        docs.insert(doc.id, (collection.to_string(), doc.clone()));
        Ok(doc.clone())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<MediaDocument>, AppError> {
        let docs = lock(&self.docs)?;
        Ok(docs
            .get(&id)
            .filter(|(c, _)| c == collection)
            .map(|(_, doc)| doc.clone()))
    }

    async fn update(
        &self,
        collection: &str,
        doc: &MediaDocument,
    ) -> Result<MediaDocument, AppError> {
        let mut docs = lock(&self.docs)?;
        match docs.get_mut(&doc.id) {
            Some((c, stored)) if c == collection => {
                let mut updated = doc.clone();
                updated.created_at = stored.created_at;
                updated.updated_at = Utc::now();
                *stored = updated.clone();
                Ok(updated)
            }
            _ => Err(AppError::NotFound(format!("Document {} not found", doc.id))),
        }
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<MediaDocument>, AppError> {
        let mut docs = lock(&self.docs)?;
        if docs.get(&id).is_some_and(|(c, _)| c == collection) {
            return Ok(docs.remove(&id).map(|(_, doc)| doc));
        }
        Ok(None)
    }

    async fn list(
        &self,
        collection: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MediaDocument>, AppError> {
        let docs = lock(&self.docs)?;
        let mut matching: Vec<MediaDocument> = docs
            .values()
            .filter(|(c, _)| c == collection)
            .map(|(_, doc)| doc.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_one_by_public_id(
        &self,
        collection: &str,
        public_id: &str,
    ) -> Result<Option<MediaDocument>, AppError> {
        self.find_oldest(collection, |doc| {
            doc.public_id.as_deref() == Some(public_id)
        })
    }

    async fn find_one_by_filename(
        &self,
        collection: &str,
        filename: &str,
    ) -> Result<Option<MediaDocument>, AppError> {
        self.find_oldest(collection, |doc| doc.filename.as_deref() == Some(filename))
    }

    async fn update_processing_state(
        &self,
        collection: &str,
        id: Uuid,
        state: ProcessingState,
    ) -> Result<bool, AppError> {
        let mut docs = lock(&self.docs)?;
        match docs.get_mut(&id) {
            Some((c, doc)) if c == collection => {
                doc.apply_processing_state(state);
                doc.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<Mutex<HashMap<Uuid, Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_status(&self, id: Uuid, status: TaskStatus, result: Value) -> Result<(), AppError> {
        let mut tasks = lock(&self.tasks)?;
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;
        task.status = status;
        task.result = Some(result);
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, AppError> {
        lock(&self.tasks)?.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn claim_next(&self, queue: &str) -> Result<Option<Task>, AppError> {
        let mut tasks = lock(&self.tasks)?;
        let next = tasks
            .values_mut()
            .filter(|t| t.queue == queue && t.status == TaskStatus::Pending)
            .min_by_key(|t| t.created_at);

        Ok(next.map(|task| {
            task.status = TaskStatus::Running;
            task.updated_at = Utc::now();
            task.clone()
        }))
    }

    async fn mark_completed(&self, id: Uuid, result: Value) -> Result<(), AppError> {
        self.set_status(id, TaskStatus::Completed, result)
    }

    async fn mark_failed(&self, id: Uuid, result: Value) -> Result<(), AppError> {
        self.set_status(id, TaskStatus::Failed, result)
    }

    async fn increment_retry(&self, id: Uuid) -> Result<(), AppError> {
        let mut tasks = lock(&self.tasks)?;
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;
        task.retry_count += 1;
        task.status = TaskStatus::Pending;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        Ok(lock(&self.tasks)?.get(&id).cloned())
    }

    async fn count_by_status(&self, queue: &str, status: TaskStatus) -> Result<i64, AppError> {
        Ok(lock(&self.tasks)?
            .values()
            .filter(|t| t.queue == queue && t.status == status)
            .count() as i64)
    }
}
