use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediasync_core::models::{Task, TaskStatus, TaskType};
use mediasync_core::AppError;
use serde_json::Value;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Durable storage for background tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> Result<Task, AppError>;

    /// Atomically move the oldest pending task of `queue` to `running`.
    async fn claim_next(&self, queue: &str) -> Result<Option<Task>, AppError>;

    async fn mark_completed(&self, id: Uuid, result: Value) -> Result<(), AppError>;

    async fn mark_failed(&self, id: Uuid, result: Value) -> Result<(), AppError>;

    /// Put a task back to `pending` with its retry counter bumped.
    async fn increment_retry(&self, id: Uuid) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Task>, AppError>;

    async fn count_by_status(&self, queue: &str, status: TaskStatus) -> Result<i64, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    queue: String,
    task_type: TaskType,
    status: TaskStatus,
    input: Value,
    result: Option<Value>,
    retry_count: i32,
    max_retries: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            queue: row.queue,
            task_type: row.task_type,
            status: row.status,
            input: row.input,
            result: row.result,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        result: Option<Value>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, result = COALESCE($3, result), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    #[tracing::instrument(skip(self, task), fields(db.table = "tasks", db.operation = "insert", task.id = %task.id))]
    async fn create(&self, task: &Task) -> Result<Task, AppError> {
        let row: TaskRow = sqlx::query_as::<Postgres, TaskRow>(
            r#"
            INSERT INTO tasks (
                id, queue, task_type, status, input, result,
                retry_count, max_retries, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(task.id)
        .bind(&task.queue)
        .bind(task.task_type)
        .bind(task.status)
        .bind(&task.input)
        .bind(&task.result)
        .bind(task.retry_count)
        .bind(task.max_retries)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "tasks", db.operation = "update"))]
    async fn claim_next(&self, queue: &str) -> Result<Option<Task>, AppError> {
        let row: Option<TaskRow> = sqlx::query_as::<Postgres, TaskRow>(
            r#"
            UPDATE tasks SET status = 'running', updated_at = NOW()
            WHERE id = (
                SELECT id FROM tasks
                WHERE queue = $1 AND status = 'pending'
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(queue)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_completed(&self, id: Uuid, result: Value) -> Result<(), AppError> {
        self.set_status(id, TaskStatus::Completed, Some(result))
            .await
    }

    async fn mark_failed(&self, id: Uuid, result: Value) -> Result<(), AppError> {
        self.set_status(id, TaskStatus::Failed, Some(result)).await
    }

    async fn increment_retry(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', retry_count = retry_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let row: Option<TaskRow> =
            sqlx::query_as::<Postgres, TaskRow>("SELECT * FROM tasks WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn count_by_status(&self, queue: &str, status: TaskStatus) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE queue = $1 AND status = $2")
                .bind(queue)
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
