use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::ResourceType;

/// A media document of an adapter-managed collection.
///
/// `public_id` is the correlation key between the local document and the remote
/// asset. It stays `None` until the first successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDocument {
    pub id: Uuid,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub custom_filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filesize: Option<i64>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub resource_type: ResourceType,
    /// Ordered, provider-specific transformation directives.
    #[serde(default, deserialize_with = "deserialize_transformations")]
    pub raw_transformations: Vec<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub has_errors: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl MediaDocument {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: None,
            custom_filename: None,
            mime_type: None,
            filesize: None,
            width: None,
            height: None,
            url: None,
            public_id: None,
            resource_type: ResourceType::default(),
            raw_transformations: Vec::new(),
            format: None,
            is_processing: false,
            has_errors: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current processing flags of the document.
    pub fn processing_state(&self) -> ProcessingState {
        ProcessingState {
            is_processing: self.is_processing,
            has_errors: self.has_errors,
        }
    }

    pub fn apply_processing_state(&mut self, state: ProcessingState) {
        self.is_processing = state.is_processing;
        self.has_errors = state.has_errors;
    }
}

/// `null` and a missing field both mean "no transformations".
fn deserialize_transformations<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `isProcessing` / `hasErrors` pair written by the transformation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub is_processing: bool,
    pub has_errors: bool,
}

impl ProcessingState {
    /// A transformation job was accepted and has not finished yet.
    pub const BUSY: Self = Self {
        is_processing: true,
        has_errors: false,
    };
    /// The last transformation attempt succeeded.
    pub const DONE: Self = Self {
        is_processing: false,
        has_errors: false,
    };
    /// The last transformation attempt failed.
    pub const FAILED: Self = Self {
        is_processing: false,
        has_errors: true,
    };
}

/// Kind of write the host is performing on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOperation {
    Create,
    Update,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_defaults() {
        let id = Uuid::new_v4();
        let doc: MediaDocument = serde_json::from_value(json!({ "id": id })).unwrap();
        assert_eq!(doc.id, id);
        assert!(doc.raw_transformations.is_empty());
        assert_eq!(doc.resource_type, ResourceType::Image);
        assert!(!doc.is_processing);
        assert!(!doc.has_errors);
        assert!(doc.public_id.is_none());
    }

    #[test]
    fn test_null_transformations_become_empty() {
        let doc: MediaDocument = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "rawTransformations": null
        }))
        .unwrap();
        assert!(doc.raw_transformations.is_empty());
    }

    #[test]
    fn test_non_list_transformations_rejected() {
        let result: Result<MediaDocument, _> = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "rawTransformations": { "crop": true }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let mut doc = MediaDocument::new(Uuid::new_v4());
        doc.public_id = Some("folder/photo".to_string());
        doc.raw_transformations = vec!["c_crop,w_10,h_10".to_string()];
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["publicId"], "folder/photo");
        assert_eq!(value["rawTransformations"][0], "c_crop,w_10,h_10");
        assert_eq!(value["isProcessing"], false);
        assert_eq!(value["resourceType"], "image");
    }
}
