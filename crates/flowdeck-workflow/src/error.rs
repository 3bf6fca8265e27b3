//! Workflow error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Workflow not open: {0}")]
    NotOpen(String),

    #[error("Workflow already open: {0}")]
    AlreadyOpen(String),

    #[error("Tab index {index} out of range for {len} open workflows")]
    InvalidIndex { index: usize, len: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] flowdeck_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Host editor error: {0}")]
    Host(String),
}
