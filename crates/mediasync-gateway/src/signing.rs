//! Request signing for the provider's authenticated API.
//!
//! signature = hex(SHA-256("k1=v1&k2=v2..." + api_secret)), keys sorted,
//! empty values and transport-only keys left out.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub(crate) const SIGNATURE_ALGORITHM: &str = "sha256";

const UNSIGNED_KEYS: &[&str] = &[
    "file",
    "cloud_name",
    "resource_type",
    "api_key",
    "signature",
    "signature_algorithm",
];

pub(crate) fn sign(params: &BTreeMap<String, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .filter(|(k, v)| !v.is_empty() && !UNSIGNED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
