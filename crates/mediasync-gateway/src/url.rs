//! Delivery URL construction

use mediasync_core::constants::THUMBNAIL_WIDTH;
use mediasync_core::ResourceType;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::traits::{ResourceDescriptor, UrlVariant};

/// Characters escaped inside a public id path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const DOWNLOAD_FLAG: &str = "fl_attachment";

/// Builds delivery URLs from a resource descriptor.
#[derive(Debug, Clone)]
pub struct DeliveryUrlBuilder {
    base_url: String,
    cloud_name: String,
}

impl DeliveryUrlBuilder {
    pub fn new(delivery_base_url: &str, cloud_name: &str, secure: bool) -> Self {
        let trimmed = delivery_base_url.trim_end_matches('/');
        let base_url = if secure {
            trimmed.to_string()
        } else {
            trimmed.replacen("https://", "http://", 1)
        };

        Self {
            base_url,
            cloud_name: cloud_name.to_string(),
        }
    }

    pub fn build(&self, resource: &ResourceDescriptor, variant: UrlVariant) -> Option<String> {
        let public_id = resource.public_id.as_deref().map(str::trim)?;
        if public_id.is_empty() {
            return None;
        }

        if variant == UrlVariant::Thumbnail && !resource.resource_type.is_media() {
            return None;
        }

        let mut chain = transformation_chain(&resource.raw_transformations);
        match variant {
            UrlVariant::Secure => {}
            UrlVariant::Download => chain.push(DOWNLOAD_FLAG.to_string()),
            UrlVariant::Thumbnail => chain.push(format!("c_limit,w_{}", THUMBNAIL_WIDTH)),
        }

        let extension = match (variant, resource.resource_type) {
            (UrlVariant::Thumbnail, ResourceType::Video) => Some("jpg"),
            _ => resource.format.as_deref().filter(|f| !f.is_empty()),
        };

        let encoded_id = public_id
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");

        let mut url = format!(
            "{}/{}/{}/upload/",
            self.base_url, self.cloud_name, resource.resource_type
        );
        for step in &chain {
            url.push_str(step);
            url.push('/');
        }
        url.push_str(&encoded_id);
        if let Some(ext) = extension {
            url.push('.');
            url.push_str(ext);
        }

        Some(url)
    }
}

/// Normalized transformation chain: trimmed, no empty steps, no stray slashes.
pub fn transformation_chain(raw_transformations: &[String]) -> Vec<String> {
    raw_transformations
        .iter()
        .map(|t| t.trim().trim_matches('/'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
