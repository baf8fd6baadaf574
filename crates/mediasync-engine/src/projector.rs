//! Read-time projection of media documents.
//!
//! Pure and infallible: missing inputs produce `None` fields.

use mediasync_core::MediaDocument;
use mediasync_gateway::{MediaGateway, ResourceDescriptor, UrlVariant};
use serde::Serialize;

const CROP_PREFIX: &str = "c_crop";

/// A document as returned to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedDocument {
    #[serde(flatten)]
    pub doc: MediaDocument,
    #[serde(rename = "secureURL")]
    pub secure_url: Option<String>,
    #[serde(rename = "downloadURL")]
    pub download_url: Option<String>,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: Option<String>,
}

/// Value of the `{key}_{n}` parameter of a single step, e.g. `w` in `c_crop,w_300`.
fn param(step: &str, key: &str) -> Option<i32> {
    step.split(',')
        .filter_map(|p| p.trim().strip_prefix(key)?.strip_prefix('_'))
        .find_map(|value| value.parse().ok())
}

/// Width and height after crop directives.
///
/// Every crop step overrides whichever dimension it names, so the last one
/// wins. Steps are split on `/` since a single directive may chain several.
pub fn effective_dimensions(doc: &MediaDocument) -> (Option<i32>, Option<i32>) {
    let mut width = doc.width;
    let mut height = doc.height;

    let crops = doc
        .raw_transformations
        .iter()
        .flat_map(|directive| directive.split('/'))
        .map(str::trim)
        .filter(|step| step.starts_with(CROP_PREFIX));

    for step in crops {
        if let Some(w) = param(step, "w") {
            width = Some(w);
        }
        if let Some(h) = param(step, "h") {
            height = Some(h);
        }
    }

    (width, height)
}

/// Decorate a document with projected dimensions and derived URLs.
pub fn project(gateway: &dyn MediaGateway, mut doc: MediaDocument) -> ProjectedDocument {
    let resource = ResourceDescriptor::from(&doc);
    let secure_url = gateway.derive_url(&resource, UrlVariant::Secure);
    let download_url = gateway.derive_url(&resource, UrlVariant::Download);
    let thumbnail_url = gateway.derive_url(&resource, UrlVariant::Thumbnail);

    let (width, height) = effective_dimensions(&doc);
    doc.width = width;
    doc.height = height;

    ProjectedDocument {
        doc,
        secure_url,
        download_url,
        thumbnail_url,
    }
}

/// Public URL of a document: the derived secure URL, else the stored `url`.
pub fn generate_url(gateway: &dyn MediaGateway, doc: &MediaDocument) -> Option<String> {
    gateway
        .derive_url(&ResourceDescriptor::from(doc), UrlVariant::Secure)
        .or_else(|| doc.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{uploaded_document, MockGateway};
    use uuid::Uuid;

    fn sized(transformations: &[&str]) -> MediaDocument {
        let mut doc = MediaDocument::new(Uuid::new_v4());
        doc.width = Some(1000);
        doc.height = Some(800);
        doc.raw_transformations = transformations.iter().map(|s| s.to_string()).collect();
        doc
    }

    #[test]
    fn test_crop_overrides_stored_dimensions() {
        let doc = sized(&["e_sepia/c_crop,w_300,h_200/q_auto"]);
        assert_eq!(effective_dimensions(&doc), (Some(300), Some(200)));
    }

    #[test]
    fn test_last_crop_wins() {
        let doc = sized(&["c_crop,w_300,h_200", "e_blur", "c_crop,w_50"]);
        assert_eq!(effective_dimensions(&doc), (Some(50), Some(200)));
    }

    #[test]
    fn test_crop_reads_only_exact_size_params() {
        let doc = sized(&["c_crop,g_north,ow_12,w_120,h_auto"]);
        assert_eq!(effective_dimensions(&doc), (Some(120), Some(800)));
    }

    #[test]
    fn test_non_crop_directives_are_ignored() {
        let doc = sized(&["c_scale,w_300,h_200", "e_sepia"]);
        assert_eq!(effective_dimensions(&doc), (Some(1000), Some(800)));
    }

    #[test]
    fn test_projection_without_public_id_has_no_urls() {
        let gateway = MockGateway::new();
        let projected = project(&gateway, sized(&[]));
        assert!(projected.secure_url.is_none());
        assert!(projected.download_url.is_none());
        assert!(projected.thumbnail_url.is_none());
        assert_eq!(projected.doc.width, Some(1000));
    }

    #[test]
    fn test_projection_urls_and_wire_names() {
        let gateway = MockGateway::new();
        let mut doc = uploaded_document("uploads/photo");
        doc.raw_transformations = vec!["c_crop,w_300,h_200".to_string()];
        let projected = project(&gateway, doc);

        let secure = projected.secure_url.clone().unwrap();
        assert!(secure.contains("/c_crop,w_300,h_200/uploads/photo.png"));
        assert!(projected
            .download_url
            .as_deref()
            .unwrap()
            .contains("fl_attachment"));

        let value = serde_json::to_value(&projected).unwrap();
        assert_eq!(value["secureURL"], secure);
        assert_eq!(value["width"], 300);
        assert_eq!(value["publicId"], "uploads/photo");
        assert!(value.get("thumbnailURL").is_some());
    }

    #[test]
    fn test_generate_url_falls_back_to_stored_url() {
        let gateway = MockGateway::new();
        let mut doc = MediaDocument::new(Uuid::new_v4());
        doc.url = Some("https://cdn.example.com/legacy.png".to_string());
        assert_eq!(
            generate_url(&gateway, &doc).as_deref(),
            Some("https://cdn.example.com/legacy.png")
        );
    }
}
