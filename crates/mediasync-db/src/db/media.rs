use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediasync_core::{AppError, MediaDocument, ProcessingState, ResourceType};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Repository for media documents of adapter-managed collections.
///
/// Every lookup is scoped to a collection slug.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn insert(&self, collection: &str, doc: &MediaDocument)
        -> Result<MediaDocument, AppError>;

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<MediaDocument>, AppError>;

    /// Replace a stored document. `NotFound` when it does not exist.
    async fn update(&self, collection: &str, doc: &MediaDocument)
        -> Result<MediaDocument, AppError>;

    /// Remove a document, returning what was stored.
    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<MediaDocument>, AppError>;

    async fn list(
        &self,
        collection: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MediaDocument>, AppError>;

    /// Oldest document carrying `public_id`.
    async fn find_one_by_public_id(
        &self,
        collection: &str,
        public_id: &str,
    ) -> Result<Option<MediaDocument>, AppError>;

    async fn find_one_by_filename(
        &self,
        collection: &str,
        filename: &str,
    ) -> Result<Option<MediaDocument>, AppError>;

    /// Write only the processing flags of a document. Returns false when the
    /// document no longer exists.
    async fn update_processing_state(
        &self,
        collection: &str,
        id: Uuid,
        state: ProcessingState,
    ) -> Result<bool, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct MediaDocumentRow {
    id: Uuid,
    filename: Option<String>,
    custom_filename: Option<String>,
    mime_type: Option<String>,
    filesize: Option<i64>,
    width: Option<i32>,
    height: Option<i32>,
    url: Option<String>,
    public_id: Option<String>,
    resource_type: ResourceType,
    raw_transformations: Vec<String>,
    format: Option<String>,
    is_processing: bool,
    has_errors: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MediaDocumentRow> for MediaDocument {
    fn from(row: MediaDocumentRow) -> Self {
        MediaDocument {
            id: row.id,
            filename: row.filename,
            custom_filename: row.custom_filename,
            mime_type: row.mime_type,
            filesize: row.filesize,
            width: row.width,
            height: row.height,
            url: row.url,
            public_id: row.public_id,
            resource_type: row.resource_type,
            raw_transformations: row.raw_transformations,
            format: row.format,
            is_processing: row.is_processing,
            has_errors: row.has_errors,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, filename, custom_filename, mime_type, filesize, width, height, url,
    public_id, resource_type, raw_transformations, format, is_processing,
    has_errors, created_at, updated_at
"#;

/// PostgreSQL-backed media repository
#[derive(Clone)]
pub struct PgMediaRepository {
    pool: PgPool,
}

impl PgMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    #[tracing::instrument(skip(self, doc), fields(db.table = "media_documents", db.operation = "insert", id = %doc.id))]
    async fn insert(
        &self,
        collection: &str,
        doc: &MediaDocument,
    ) -> Result<MediaDocument, AppError> {
        let row: MediaDocumentRow = sqlx::query_as::<Postgres, MediaDocumentRow>(&format!(
            r#"
            INSERT INTO media_documents (
                id, collection, filename, custom_filename, mime_type, filesize,
                width, height, url, public_id, resource_type, raw_transformations,
                format, is_processing, has_errors, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(doc.id)
        .bind(collection)
        .bind(&doc.filename)
        .bind(&doc.custom_filename)
        .bind(&doc.mime_type)
        .bind(doc.filesize)
        .bind(doc.width)
        .bind(doc.height)
        .bind(&doc.url)
        .bind(&doc.public_id)
        .bind(doc.resource_type)
        .bind(&doc.raw_transformations)
        .bind(&doc.format)
        .bind(doc.is_processing)
        .bind(doc.has_errors)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_documents", db.operation = "select"))]
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<MediaDocument>, AppError> {
        let row: Option<MediaDocumentRow> = sqlx::query_as::<Postgres, MediaDocumentRow>(&format!(
            "SELECT {} FROM media_documents WHERE collection = $1 AND id = $2",
            SELECT_COLUMNS
        ))
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self, doc), fields(db.table = "media_documents", db.operation = "update", id = %doc.id))]
    async fn update(
        &self,
        collection: &str,
        doc: &MediaDocument,
    ) -> Result<MediaDocument, AppError> {
        let row: Option<MediaDocumentRow> = sqlx::query_as::<Postgres, MediaDocumentRow>(&format!(
            r#"
            UPDATE media_documents SET
                filename = $3, custom_filename = $4, mime_type = $5, filesize = $6,
                width = $7, height = $8, url = $9, public_id = $10, resource_type = $11,
                raw_transformations = $12, format = $13, is_processing = $14,
                has_errors = $15, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(collection)
        .bind(doc.id)
        .bind(&doc.filename)
        .bind(&doc.custom_filename)
        .bind(&doc.mime_type)
        .bind(doc.filesize)
        .bind(doc.width)
        .bind(doc.height)
        .bind(&doc.url)
        .bind(&doc.public_id)
        .bind(doc.resource_type)
        .bind(&doc.raw_transformations)
        .bind(&doc.format)
        .bind(doc.is_processing)
        .bind(doc.has_errors)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", doc.id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_documents", db.operation = "delete"))]
    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<MediaDocument>, AppError> {
        let row: Option<MediaDocumentRow> = sqlx::query_as::<Postgres, MediaDocumentRow>(&format!(
            "DELETE FROM media_documents WHERE collection = $1 AND id = $2 RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_documents", db.operation = "select"))]
    async fn list(
        &self,
        collection: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MediaDocument>, AppError> {
        let rows: Vec<MediaDocumentRow> = sqlx::query_as::<Postgres, MediaDocumentRow>(&format!(
            r#"
            SELECT {} FROM media_documents
            WHERE collection = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            SELECT_COLUMNS
        ))
        .bind(collection)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_documents", db.operation = "select"))]
    async fn find_one_by_public_id(
        &self,
        collection: &str,
        public_id: &str,
    ) -> Result<Option<MediaDocument>, AppError> {
        let row: Option<MediaDocumentRow> = sqlx::query_as::<Postgres, MediaDocumentRow>(&format!(
            r#"
            SELECT {} FROM media_documents
            WHERE collection = $1 AND public_id = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
            SELECT_COLUMNS
        ))
        .bind(collection)
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_documents", db.operation = "select"))]
    async fn find_one_by_filename(
        &self,
        collection: &str,
        filename: &str,
    ) -> Result<Option<MediaDocument>, AppError> {
        let row: Option<MediaDocumentRow> = sqlx::query_as::<Postgres, MediaDocumentRow>(&format!(
            r#"
            SELECT {} FROM media_documents
            WHERE collection = $1 AND filename = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
            SELECT_COLUMNS
        ))
        .bind(collection)
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_documents", db.operation = "update"))]
    async fn update_processing_state(
        &self,
        collection: &str,
        id: Uuid,
        state: ProcessingState,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE media_documents
            SET is_processing = $3, has_errors = $4, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(state.is_processing)
        .bind(state.has_errors)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
