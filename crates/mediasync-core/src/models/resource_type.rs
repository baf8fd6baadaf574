use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::mime::extension_from_mime_type;

/// Remote resource category, as understood by the hosting provider.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[default]
    Image,
    Video,
    Raw,
    Auto,
}

impl ResourceType {
    /// Infer the resource type from a MIME type. Unknown types are `Raw`.
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        match extension_from_mime_type(mime_type) {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => ResourceType::Image,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => ResourceType::Video,
            _ => ResourceType::Raw,
        }
    }

    /// Images and videos are media; they support transformations and thumbnails.
    pub fn is_media(&self) -> bool {
        matches!(self, ResourceType::Image | ResourceType::Video)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Raw => "raw",
            ResourceType::Auto => "auto",
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(ResourceType::Image),
            "video" => Ok(ResourceType::Video),
            "raw" => Ok(ResourceType::Raw),
            "auto" => Ok(ResourceType::Auto),
            _ => Err(anyhow::anyhow!("Invalid resource type: {}", s)),
        }
    }
}
