//! Plugin registration
//!
//! One [`MediaSyncAdapter`] per configured collection, sharing a gateway built
//! once from configuration and passed in explicitly.

use anyhow::{anyhow, Context, Result};
use mediasync_core::models::{Task, TaskType};
use mediasync_core::{Config, TransformationJobInput};
use mediasync_db::MediaRepository;
use mediasync_gateway::MediaGateway;
use mediasync_worker::JobQueue;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::MediaSyncAdapter;
use crate::fields::UploadSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSyncOptions {
    pub enabled: bool,
    pub collections: Vec<String>,
}

impl MediaSyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.enabled,
            collections: config.collections.clone(),
        }
    }
}

#[derive(Default)]
pub struct MediaSyncPlugin {
    adapters: HashMap<String, Arc<MediaSyncAdapter>>,
}

impl MediaSyncPlugin {
    /// Register adapters for every configured collection. A disabled plugin
    /// registers nothing.
    pub fn register(
        options: &MediaSyncOptions,
        gateway: Arc<dyn MediaGateway>,
        media: Arc<dyn MediaRepository>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        if !options.enabled {
            tracing::info!("Media sync plugin disabled, no collection adapters registered");
            return Self::disabled();
        }

        let adapters = options
            .collections
            .iter()
            .map(|slug| {
                let adapter =
                    MediaSyncAdapter::new(slug.clone(), gateway.clone(), media.clone(), jobs.clone());
                (slug.clone(), Arc::new(adapter))
            })
            .collect::<HashMap<_, _>>();

        tracing::info!(
            gateway = gateway.name(),
            collections = ?options.collections,
            "Media sync plugin registered"
        );

        Self { adapters }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.adapters.is_empty()
    }

    pub fn adapter(&self, collection: &str) -> Option<Arc<MediaSyncAdapter>> {
        self.adapters.get(collection).cloned()
    }

    pub fn collections(&self) -> Vec<&str> {
        let mut slugs: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        slugs.sort_unstable();
        slugs
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings::default()
    }

    /// Execute a task claimed from the job queue.
    pub async fn handle_task(&self, task: &Task) -> Result<serde_json::Value> {
        match task.task_type {
            TaskType::UpdateTransformations => {
                let input: TransformationJobInput = serde_json::from_value(task.input.clone())
                    .context("Invalid update_transformations input")?;

                let adapter = self.adapter(&input.collection).ok_or_else(|| {
                    anyhow!("No media sync adapter for collection {}", input.collection)
                })?;

                adapter.run_transformation_job(&input).await?;

                Ok(json!({ "publicId": input.doc.public_id }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{uploaded_document, Fixture};
    use mediasync_core::constants::TRANSFORMATION_QUEUE;
    use mediasync_core::ProcessingState;

    fn options(enabled: bool) -> MediaSyncOptions {
        MediaSyncOptions {
            enabled,
            collections: vec!["media".to_string(), "avatars".to_string()],
        }
    }

    fn plugin(fx: &Fixture, enabled: bool) -> MediaSyncPlugin {
        MediaSyncPlugin::register(
            &options(enabled),
            fx.gateway.clone(),
            fx.media.clone(),
            fx.jobs.clone(),
        )
    }

    #[test]
    fn test_register_one_adapter_per_collection() {
        let fx = Fixture::new();
        let plugin = plugin(&fx, true);
        assert!(plugin.is_enabled());
        assert_eq!(plugin.collections(), vec!["avatars", "media"]);
        assert_eq!(plugin.adapter("media").unwrap().collection(), "media");
        assert!(plugin.adapter("posts").is_none());
        assert!(plugin.upload_settings().disable_local_storage);
    }

    #[test]
    fn test_disabled_registers_nothing() {
        let fx = Fixture::new();
        let plugin = plugin(&fx, false);
        assert!(!plugin.is_enabled());
        assert!(plugin.adapter("media").is_none());
    }

    #[tokio::test]
    async fn test_handle_task_routes_to_collection() {
        let fx = Fixture::new();
        let plugin = plugin(&fx, true);
        let mut doc = uploaded_document("uploads/avatar");
        doc.raw_transformations = vec!["e_sepia".to_string()];
        doc.apply_processing_state(ProcessingState::BUSY);
        fx.media.insert("avatars", &doc).await.unwrap();

        let input = TransformationJobInput {
            collection: "avatars".to_string(),
            doc: doc.clone(),
            previous_doc: None,
        };
        let task = Task::new(
            TRANSFORMATION_QUEUE,
            TaskType::UpdateTransformations,
            serde_json::to_value(&input).unwrap(),
        );

        let result = plugin.handle_task(&task).await.unwrap();
        assert_eq!(result["publicId"], "uploads/avatar");
        let stored = fx.media.get("avatars", doc.id).await.unwrap().unwrap();
        assert_eq!(stored.processing_state(), ProcessingState::DONE);
    }

    #[tokio::test]
    async fn test_handle_task_rejects_unknown_collection() {
        let fx = Fixture::new();
        let plugin = plugin(&fx, true);
        let input = TransformationJobInput {
            collection: "posts".to_string(),
            doc: uploaded_document("uploads/x"),
            previous_doc: None,
        };
        let task = Task::new(
            TRANSFORMATION_QUEUE,
            TaskType::UpdateTransformations,
            serde_json::to_value(&input).unwrap(),
        );
        assert!(plugin.handle_task(&task).await.is_err());
    }
}
