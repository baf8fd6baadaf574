//! Field definitions the adapter adds to a collection.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Select,
    Json,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub hidden: bool,
    pub read_only: bool,
    /// Computed on read, never stored.
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
    pub index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
}

impl FieldDefinition {
    fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            hidden: false,
            read_only: false,
            is_virtual: false,
            index: false,
            default_value: None,
            options: Vec::new(),
        }
    }

    fn internal(name: &'static str, field_type: FieldType) -> Self {
        Self {
            hidden: true,
            read_only: true,
            ..Self::new(name, field_type)
        }
    }
}

/// Upload behaviour forced on adapter-managed collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    pub disable_local_storage: bool,
    pub crop: bool,
    pub focal_point: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            disable_local_storage: true,
            crop: false,
            focal_point: false,
        }
    }
}

pub fn adapter_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition {
            index: true,
            ..FieldDefinition::internal("publicId", FieldType::Text)
        },
        FieldDefinition::new("customFilename", FieldType::Text),
        FieldDefinition {
            default_value: Some(json!("image")),
            options: vec!["image", "video", "raw", "auto"],
            ..FieldDefinition::internal("resourceType", FieldType::Select)
        },
        FieldDefinition {
            default_value: Some(json!([])),
            ..FieldDefinition::internal("rawTransformations", FieldType::Json)
        },
        FieldDefinition::internal("format", FieldType::Text),
        FieldDefinition {
            default_value: Some(json!(false)),
            ..FieldDefinition::internal("isProcessing", FieldType::Checkbox)
        },
        FieldDefinition {
            default_value: Some(json!(false)),
            ..FieldDefinition::internal("hasErrors", FieldType::Checkbox)
        },
        FieldDefinition {
            is_virtual: true,
            ..FieldDefinition::internal("secureURL", FieldType::Text)
        },
        FieldDefinition {
            is_virtual: true,
            ..FieldDefinition::internal("downloadURL", FieldType::Text)
        },
    ]
}
