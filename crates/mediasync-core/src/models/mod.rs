//! Domain models

pub mod document;
pub mod file;
pub mod job;
pub mod resource_type;

pub use document::{MediaDocument, ProcessingState, WriteOperation};
pub use file::IncomingFile;
pub use job::{Task, TaskStatus, TaskType, TransformationJobInput};
pub use resource_type::ResourceType;
