//! Event error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Unknown tab event kind: {0}")]
    UnknownKind(String),

    #[error("Malformed tab event: {0}")]
    Malformed(#[from] serde_json::Error),
}
