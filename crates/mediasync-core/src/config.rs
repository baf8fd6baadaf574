//! Configuration module
//!
//! Configuration is read once at startup, validated, and then passed by reference
//! to whatever needs it. Nothing here is cached globally.

use std::env;
use std::str::FromStr;

use crate::constants::DEFAULT_COLLECTION;

const SERVER_PORT: u16 = 3000;
const DB_MAX_CONNECTIONS: u32 = 20;
const DB_TIMEOUT_SECS: u64 = 30;
const GATEWAY_TIMEOUT_SECS: u64 = 60;
const TASK_QUEUE_MAX_WORKERS: usize = 4;
const TASK_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_API_BASE_URL: &str = "https://api.cloudinary.com";
const DEFAULT_DELIVERY_BASE_URL: &str = "https://res.cloudinary.com";
const DEFAULT_INTERNAL_USER_AGENT: &str = "node";

/// Remote media service credentials and endpoints.
#[derive(Clone)]
pub struct GatewayConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder new assets are uploaded into.
    pub folder: Option<String>,
    pub api_base_url: String,
    pub delivery_base_url: String,
    /// Build `https` delivery URLs.
    pub secure: bool,
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[redacted]")
            .field("folder", &self.folder)
            .field("api_base_url", &self.api_base_url)
            .field("delivery_base_url", &self.delivery_base_url)
            .field("secure", &self.secure)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    /// PostgreSQL connection string. In-memory repositories are used when unset.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// `json` switches the log output to JSON lines.
    pub log_format: String,
    /// When false no collection adapter is registered and no collection is served.
    pub enabled: bool,
    /// Collection slugs the adapter is attached to.
    pub collections: Vec<String>,
    /// User-Agent identifying same-process clients of the static file handler.
    pub internal_client_user_agent: String,
    pub task_queue_max_workers: usize,
    pub task_queue_poll_interval_ms: u64,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let collections: Vec<String> = lookup("MEDIASYNC_COLLECTIONS")
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let gateway = GatewayConfig {
            cloud_name: lookup("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
            api_key: lookup("CLOUDINARY_API_KEY").unwrap_or_default(),
            api_secret: lookup("CLOUDINARY_API_SECRET").unwrap_or_default(),
            folder: lookup("CLOUDINARY_FOLDER").filter(|s| !s.trim().is_empty()),
            api_base_url: lookup("CLOUDINARY_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            delivery_base_url: lookup("CLOUDINARY_DELIVERY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_DELIVERY_BASE_URL.to_string()),
            secure: parse_or(&lookup, "CLOUDINARY_SECURE", true)?,
            timeout_seconds: parse_or(&lookup, "GATEWAY_TIMEOUT_SECONDS", GATEWAY_TIMEOUT_SECS)?,
        };

        Ok(Config {
            server_port: parse_or(&lookup, "SERVER_PORT", SERVER_PORT)?,
            environment,
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS)?,
            db_timeout_seconds: parse_or(&lookup, "DB_TIMEOUT_SECONDS", DB_TIMEOUT_SECS)?,
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "compact".to_string()),
            enabled: parse_or(&lookup, "MEDIASYNC_ENABLED", true)?,
            collections,
            internal_client_user_agent: lookup("INTERNAL_CLIENT_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_INTERNAL_USER_AGENT.to_string()),
            task_queue_max_workers: parse_or(
                &lookup,
                "TASK_QUEUE_MAX_WORKERS",
                TASK_QUEUE_MAX_WORKERS,
            )?,
            task_queue_poll_interval_ms: parse_or(
                &lookup,
                "TASK_QUEUE_POLL_INTERVAL_MS",
                TASK_QUEUE_POLL_INTERVAL_MS,
            )?,
            gateway,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.task_queue_max_workers == 0 {
            return Err(anyhow::anyhow!("TASK_QUEUE_MAX_WORKERS must be at least 1"));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if !self.enabled {
            return Ok(());
        }

        if self.collections.is_empty() {
            return Err(anyhow::anyhow!(
                "MEDIASYNC_COLLECTIONS must name at least one collection"
            ));
        }

        let missing: Vec<&str> = [
            ("CLOUDINARY_CLOUD_NAME", &self.gateway.cloud_name),
            ("CLOUDINARY_API_KEY", &self.gateway.api_key),
            ("CLOUDINARY_API_SECRET", &self.gateway.api_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(anyhow::anyhow!(
                "Missing media gateway configuration: {}",
                missing.join(", ")
            ));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(default),
    }
}
