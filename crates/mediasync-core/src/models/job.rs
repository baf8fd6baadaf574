use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::MediaDocument;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    UpdateTransformations,
}

impl TaskType {
    /// Automatic retries allowed for this task type.
    ///
    /// Transformation failures stay visible on the document (`hasErrors`) instead
    /// of being retried.
    pub fn max_retries(&self) -> i32 {
        match self {
            TaskType::UpdateTransformations => 0,
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskType::UpdateTransformations => write!(f, "update_transformations"),
        }
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_transformations" => Ok(TaskType::UpdateTransformations),
            _ => Err(anyhow::anyhow!("Invalid task type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// A durable unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub queue: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub input: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(queue: impl Into<String>, task_type: TaskType, input: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            queue: queue.into(),
            task_type,
            status: TaskStatus::Pending,
            input,
            result: None,
            retry_count: 0,
            max_retries: task_type.max_retries(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Input of the `update_transformations` task.
///
/// `doc` and `previous_doc` are value copies taken at enqueue time; the job
/// re-fetches the live document before every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationJobInput {
    pub collection: String,
    pub doc: MediaDocument,
    pub previous_doc: Option<MediaDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_type_round_trip() {
        let tt: TaskType = "update_transformations".parse().unwrap();
        assert_eq!(tt, TaskType::UpdateTransformations);
        assert_eq!(tt.to_string(), "update_transformations");
        assert!("video_transcode".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_update_transformations_never_retries() {
        let task = Task::new("remote-media", TaskType::UpdateTransformations, json!({}));
        assert_eq!(task.max_retries, 0);
        assert!(!task.can_retry());
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_job_input_requires_previous_doc_key() {
        let doc = MediaDocument::new(Uuid::new_v4());
        let input = TransformationJobInput {
            collection: "media".to_string(),
            doc,
            previous_doc: None,
        };
        let value = serde_json::to_value(&input).unwrap();
        assert!(value.get("previousDoc").is_some());
        assert!(value["previousDoc"].is_null());

        let back: TransformationJobInput = serde_json::from_value(value).unwrap();
        assert_eq!(back, input);
    }
}
