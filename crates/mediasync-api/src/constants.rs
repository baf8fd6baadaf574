//! API constants

/// Prefix of the collection routes.
pub const API_PREFIX: &str = "/api";

/// Upper bound of a request body, multipart uploads included (512 MiB).
pub const MAX_REQUEST_BODY_BYTES: usize = 512 * 1024 * 1024;

/// Server-wide cap on in-flight requests.
pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;

pub const MAX_PAGE_LIMIT: i64 = 100;

/// Timeout applied to each dependency probe of the readiness check.
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;
