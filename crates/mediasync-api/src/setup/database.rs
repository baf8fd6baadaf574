//! Database setup and initialization

use anyhow::{Context, Result};
use mediasync_core::Config;
use mediasync_db::{
    InMemoryMediaRepository, InMemoryTaskRepository, MediaRepository, PgMediaRepository,
    PgTaskRepository, TaskRepository,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Document and task storage the rest of the application is built on.
#[derive(Clone)]
pub struct Repositories {
    pub media: Arc<dyn MediaRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub pool: Option<PgPool>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            media: Arc::new(InMemoryMediaRepository::new()),
            tasks: Arc::new(InMemoryTaskRepository::new()),
            pool: None,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            media: Arc::new(PgMediaRepository::new(pool.clone())),
            tasks: Arc::new(PgTaskRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }
}

/// PostgreSQL repositories when `DATABASE_URL` is set, in-memory ones otherwise.
pub async fn setup_repositories(config: &Config) -> Result<Repositories> {
    match &config.database_url {
        Some(url) => {
            let pool = setup_database(config, url).await?;
            Ok(Repositories::postgres(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, documents and tasks are kept in memory");
            Ok(Repositories::in_memory())
        }
    }
}

/// Setup database connection pool and run migrations
pub async fn setup_database(config: &Config, database_url: &str) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    // Workspace migrations/, relative to this crate's root
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
