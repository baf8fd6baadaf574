//! Mediasync Gateway Library
//!
//! This crate provides the remote media gateway abstraction and its
//! Cloudinary-compatible HTTP implementation.
//!
//! # Delivery URL format
//!
//! `{delivery_base}/{cloud}/{resource_type}/upload/{chain}/{public_id}.{format}`
//!
//! The chain is the document's `rawTransformations` joined by `/`, followed by
//! the variant flag (`fl_attachment` for downloads, a size limit for thumbnails).
//! URL derivation never touches the network.

#[cfg(feature = "gateway-cloudinary")]
pub mod cloudinary;
pub mod factory;
pub(crate) mod signing;
pub mod traits;
pub mod url;

// Re-export commonly used types
#[cfg(feature = "gateway-cloudinary")]
pub use cloudinary::CloudinaryGateway;
pub use factory::create_gateway;
pub use traits::{
    GatewayError, GatewayResult, MediaGateway, ResourceDescriptor, UploadResponse, UrlVariant,
};
pub use url::DeliveryUrlBuilder;
