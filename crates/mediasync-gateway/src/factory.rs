#[cfg(feature = "gateway-cloudinary")]
use crate::CloudinaryGateway;
use crate::{GatewayError, GatewayResult, MediaGateway};
use mediasync_core::GatewayConfig;
use std::sync::Arc;

/// Create the media gateway based on configuration
pub fn create_gateway(config: &GatewayConfig) -> GatewayResult<Arc<dyn MediaGateway>> {
    if config.api_key.trim().is_empty() || config.api_secret.trim().is_empty() {
        return Err(GatewayError::ConfigError(
            "CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET must be configured".to_string(),
        ));
    }

    #[cfg(feature = "gateway-cloudinary")]
    {
        let gateway = CloudinaryGateway::new(config.clone())?;
        tracing::info!(
            gateway = gateway.name(),
            cloud_name = %config.cloud_name,
            folder = ?config.folder,
            "Media gateway initialized"
        );
        Ok(Arc::new(gateway))
    }

    #[cfg(not(feature = "gateway-cloudinary"))]
    {
        Err(GatewayError::ConfigError(
            "Cloudinary gateway not available (gateway-cloudinary feature not enabled)".to_string(),
        ))
    }
}

#[cfg(all(test, feature = "gateway-cloudinary"))]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: None,
            api_base_url: "https://api.cloudinary.com".to_string(),
            delivery_base_url: "https://res.cloudinary.com".to_string(),
            secure: true,
            timeout_seconds: 10,
        }
    }

    #[test]
    fn test_create_gateway() {
        let gateway = create_gateway(&config()).unwrap();
        assert_eq!(gateway.name(), "cloudinary");
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let mut cfg = config();
        cfg.api_secret = " ".to_string();
        assert!(matches!(
            create_gateway(&cfg),
            Err(GatewayError::ConfigError(_))
        ));
    }
}
