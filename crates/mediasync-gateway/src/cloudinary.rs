//! Cloudinary-compatible gateway over the provider's REST upload API.

use async_trait::async_trait;
use bytes::Bytes;
use mediasync_core::constants::{MULTIPART_THRESHOLD, UPLOAD_CHUNK_SIZE};
use mediasync_core::{GatewayConfig, IncomingFile, MediaDocument, ResourceType};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::signing::{sign, SIGNATURE_ALGORITHM};
use crate::traits::{
    GatewayError, GatewayResult, MediaGateway, ResourceDescriptor, UploadResponse, UrlVariant,
};
use crate::url::{transformation_chain, DeliveryUrlBuilder};

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Gateway talking to a Cloudinary-compatible REST API.
#[derive(Clone)]
pub struct CloudinaryGateway {
    http_client: reqwest::Client,
    config: GatewayConfig,
    urls: DeliveryUrlBuilder,
}

impl std::fmt::Debug for CloudinaryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryGateway")
            .field("cloud_name", &self.config.cloud_name)
            .finish()
    }
}

impl CloudinaryGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        if config.cloud_name.trim().is_empty() {
            return Err(GatewayError::ConfigError(
                "cloud name is not configured".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let urls =
            DeliveryUrlBuilder::new(&config.delivery_base_url, &config.cloud_name, config.secure);

        Ok(Self {
            http_client,
            config,
            urls,
        })
    }

    fn endpoint(&self, resource_type: ResourceType, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.cloud_name,
            resource_type,
            action
        )
    }

    /// Add timestamp, api key and signature to a parameter set.
    fn signed(&self, mut params: BTreeMap<String, String>) -> BTreeMap<String, String> {
        params.insert(
            "timestamp".to_string(),
            chrono::Utc::now().timestamp().to_string(),
        );
        let signature = sign(&params, &self.config.api_secret);
        params.insert("api_key".to_string(), self.config.api_key.clone());
        params.insert("signature".to_string(), signature);
        params.insert(
            "signature_algorithm".to_string(),
            SIGNATURE_ALGORITHM.to_string(),
        );
        params
    }

    fn upload_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if let Some(folder) = &self.config.folder {
            params.insert("folder".to_string(), folder.clone());
        }
        params
    }

    fn multipart_form(
        params: &BTreeMap<String, String>,
        file: &IncomingFile,
        chunk: Bytes,
    ) -> GatewayResult<Form> {
        let part = Part::stream(chunk)
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| GatewayError::Rejected(format!("Invalid MIME type: {}", e)))?;

        let form = params
            .iter()
            .fold(Form::new(), |form, (k, v)| form.text(k.clone(), v.clone()))
            .part("file", part);
        Ok(form)
    }

    async fn read_json<T>(response: reqwest::Response) -> GatewayResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GatewayError::from_status(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn upload_single(
        &self,
        file: &IncomingFile,
        resource_type: ResourceType,
    ) -> GatewayResult<UploadResponse> {
        let params = self.signed(self.upload_params());
        let form = Self::multipart_form(&params, file, file.data.clone())?;

        let response = self
            .http_client
            .post(self.endpoint(resource_type, "upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Self::read_json(response).await
    }

    /// Upload in fixed-size chunks sharing one upload id. The final chunk's
    /// response describes the complete asset.
    async fn upload_chunked(
        &self,
        file: &IncomingFile,
        resource_type: ResourceType,
    ) -> GatewayResult<UploadResponse> {
        let upload_id = Uuid::new_v4().simple().to_string();
        let total = file.data.len();
        let params = self.signed(self.upload_params());
        let mut last = None;

        let mut start = 0;
        while start < total {
            let end = (start + UPLOAD_CHUNK_SIZE).min(total);
            let chunk = file.data.slice(start..end);
            let form = Self::multipart_form(&params, file, chunk)?;

            tracing::debug!(
                upload_id = %upload_id,
                start,
                end,
                total,
                "Uploading chunk"
            );

            let response = self
                .http_client
                .post(self.endpoint(resource_type, "upload"))
                .header("X-Unique-Upload-Id", &upload_id)
                .header(
                    "Content-Range",
                    format!("bytes {}-{}/{}", start, end - 1, total),
                )
                .multipart(form)
                .send()
                .await
                .map_err(|e| GatewayError::Network(e.to_string()))?;

            if end == total {
                last = Some(Self::read_json::<UploadResponse>(response).await?);
            } else {
                Self::read_json::<serde_json::Value>(response).await?;
            }
            start = end;
        }

        last.ok_or_else(|| GatewayError::Rejected("Cannot upload an empty file".to_string()))
    }
}

#[async_trait]
impl MediaGateway for CloudinaryGateway {
    #[tracing::instrument(skip(self, file), fields(filename = %file.filename, size = file.size()))]
    async fn upload(&self, file: &IncomingFile) -> GatewayResult<UploadResponse> {
        let resource_type = ResourceType::from_mime_type(Some(&file.mime_type));

        let result = if file.size() > MULTIPART_THRESHOLD {
            self.upload_chunked(file, resource_type).await
        } else {
            self.upload_single(file, resource_type).await
        };

        match &result {
            Ok(uploaded) => tracing::debug!(
                public_id = %uploaded.public_id,
                resource_type = %uploaded.resource_type,
                "File uploaded to media gateway"
            ),
            Err(e) => tracing::error!(error = %e, "Upload to media gateway failed"),
        }

        result
    }

    #[tracing::instrument(skip(self, resource), fields(public_id = ?resource.public_id))]
    async fn delete(&self, resource: &ResourceDescriptor, invalidate: bool) -> GatewayResult<()> {
        let Some(public_id) = resource.public_id.as_deref().filter(|id| !id.is_empty()) else {
            tracing::debug!("Resource has no public id, nothing to delete");
            return Ok(());
        };

        let mut params = BTreeMap::new();
        params.insert("public_id".to_string(), public_id.to_string());
        params.insert("invalidate".to_string(), invalidate.to_string());
        let params = self.signed(params);

        let response = self
            .http_client
            .post(self.endpoint(resource.resource_type, "destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let destroyed: DestroyResponse = Self::read_json(response).await.inspect_err(|e| {
            tracing::warn!(error = %e, public_id = %public_id, "Failed to delete remote resource");
        })?;

        match destroyed.result.as_str() {
            "ok" => {
                tracing::debug!(public_id = %public_id, "Remote resource deleted");
                Ok(())
            }
            "not found" => {
                tracing::debug!(public_id = %public_id, "Remote resource already gone");
                Ok(())
            }
            other => Err(GatewayError::InvalidResponse(format!(
                "Unexpected destroy result: {}",
                other
            ))),
        }
    }

    fn derive_url(&self, resource: &ResourceDescriptor, variant: UrlVariant) -> Option<String> {
        self.urls.build(resource, variant)
    }

    #[tracing::instrument(skip(self, doc, previous_doc), fields(public_id = ?doc.public_id))]
    async fn apply_transformations(
        &self,
        doc: &MediaDocument,
        previous_doc: Option<&MediaDocument>,
    ) -> GatewayResult<()> {
        let public_id = doc
            .public_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GatewayError::NotFound("Document has no public id".to_string()))?;

        let chain = transformation_chain(&doc.raw_transformations);
        // A previous document pointing at another asset says nothing about
        // what is applied to this one.
        let previous_chain = previous_doc
            .filter(|prev| prev.public_id.as_deref() == Some(public_id))
            .map(|prev| transformation_chain(&prev.raw_transformations))
            .unwrap_or_default();
        let changed = previous_chain != chain;

        if chain.is_empty() && !changed {
            tracing::debug!(public_id = %public_id, "No transformations to apply");
            return Ok(());
        }

        let mut params = BTreeMap::new();
        params.insert("public_id".to_string(), public_id.to_string());
        params.insert("type".to_string(), "upload".to_string());
        if !chain.is_empty() {
            params.insert("eager".to_string(), chain.join("/"));
        }
        params.insert("invalidate".to_string(), changed.to_string());
        let params = self.signed(params);

        let response = self
            .http_client
            .post(self.endpoint(doc.resource_type, "explicit"))
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Self::read_json::<serde_json::Value>(response).await?;

        tracing::debug!(
            public_id = %public_id,
            steps = chain.len(),
            invalidated = changed,
            "Transformations applied"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config(api_base_url: &str) -> GatewayConfig {
        GatewayConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: Some("uploads".to_string()),
            api_base_url: api_base_url.to_string(),
            delivery_base_url: "https://res.cloudinary.com".to_string(),
            secure: true,
            timeout_seconds: 5,
        }
    }

    fn png() -> IncomingFile {
        IncomingFile::new("photo.png", "image/png", Bytes::from_static(b"\x89PNG...."))
    }

    fn uploaded_doc(transformations: &[&str]) -> MediaDocument {
        let mut doc = MediaDocument::new(Uuid::new_v4());
        doc.public_id = Some("uploads/photo".to_string());
        doc.raw_transformations = transformations.iter().map(|s| s.to_string()).collect();
        doc
    }

    #[test]
    fn test_new_requires_cloud_name() {
        let mut cfg = config("http://localhost");
        cfg.cloud_name = String::new();
        assert!(matches!(
            CloudinaryGateway::new(cfg),
            Err(GatewayError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/image/upload")
            .match_body(Matcher::Regex("uploads".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "public_id": "uploads/photo",
                    "format": "png",
                    "resource_type": "image",
                    "width": 1000,
                    "height": 800,
                    "bytes": 2048,
                    "secure_url": "https://res.cloudinary.com/demo/image/upload/v1/uploads/photo.png",
                    "version": 1
                })
                .to_string(),
            )
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let uploaded = gateway.upload(&png()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(uploaded.public_id, "uploads/photo");
        assert_eq!(uploaded.width, Some(1000));
        assert_eq!(uploaded.bytes, 2048);
        assert_eq!(uploaded.resource_type, ResourceType::Image);
    }

    #[tokio::test]
    async fn test_upload_error_is_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1_1/demo/image/upload")
            .with_status(420)
            .with_body(json!({ "error": { "message": "quota exceeded" } }).to_string())
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let err = gateway.upload(&png()).await.unwrap_err();
        assert!(matches!(err, GatewayError::QuotaExceeded(ref m) if m == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_delete_treats_not_found_as_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/image/destroy")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("public_id".to_string(), "uploads/photo".to_string()),
                Matcher::UrlEncoded("invalidate".to_string(), "true".to_string()),
            ]))
            .with_status(200)
            .with_body(json!({ "result": "not found" }).to_string())
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let doc = uploaded_doc(&[]);
        gateway
            .delete(&ResourceDescriptor::from(&doc), true)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_without_public_id_is_noop() {
        let gateway = CloudinaryGateway::new(config("http://127.0.0.1:1")).unwrap();
        let doc = MediaDocument::new(Uuid::new_v4());
        assert!(gateway
            .delete(&ResourceDescriptor::from(&doc), true)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_apply_transformations_posts_eager_chain() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/image/explicit")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("eager".to_string(), "c_crop,w_300,h_200/e_sepia".to_string()),
                Matcher::UrlEncoded("invalidate".to_string(), "true".to_string()),
                Matcher::UrlEncoded("type".to_string(), "upload".to_string()),
            ]))
            .with_status(200)
            .with_body(json!({ "public_id": "uploads/photo" }).to_string())
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let doc = uploaded_doc(&["c_crop,w_300,h_200", "e_sepia"]);
        let previous = uploaded_doc(&[]);
        gateway
            .apply_transformations(&doc, Some(&previous))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_apply_empty_chain_makes_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let doc = uploaded_doc(&[]);
        gateway.apply_transformations(&doc, None).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_apply_cleared_chain_invalidates() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/image/explicit")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("public_id".to_string(), "uploads/photo".to_string()),
                Matcher::UrlEncoded("invalidate".to_string(), "true".to_string()),
            ]))
            .with_status(200)
            .with_body(json!({ "public_id": "uploads/photo" }).to_string())
            .expect(1)
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let doc = uploaded_doc(&[]);
        let previous = uploaded_doc(&["e_sepia"]);
        gateway
            .apply_transformations(&doc, Some(&previous))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_apply_empty_chain_after_replacement_makes_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let doc = uploaded_doc(&[]);
        let mut previous = uploaded_doc(&["e_sepia"]);
        previous.public_id = Some("uploads/old".to_string());
        gateway
            .apply_transformations(&doc, Some(&previous))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_apply_on_missing_resource_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1_1/demo/image/explicit")
            .with_status(404)
            .with_body(json!({ "error": { "message": "Resource not found" } }).to_string())
            .create_async()
            .await;

        let gateway = CloudinaryGateway::new(config(&server.url())).unwrap();
        let err = gateway
            .apply_transformations(&uploaded_doc(&["e_sepia"]), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_derive_url_uses_delivery_base() {
        let gateway = CloudinaryGateway::new(config("http://localhost")).unwrap();
        let mut doc = uploaded_doc(&["e_sepia"]);
        doc.format = Some("png".to_string());
        assert_eq!(
            gateway
                .derive_url(&ResourceDescriptor::from(&doc), UrlVariant::Secure)
                .as_deref(),
            Some("https://res.cloudinary.com/demo/image/upload/e_sepia/uploads/photo.png")
        );
    }
}
