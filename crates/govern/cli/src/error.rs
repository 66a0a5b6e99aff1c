//! CLI error types

use govern_storage::StorageError;
use govern_types::PayloadError;
use govern_workflow::WorkflowError;
use thiserror::Error;

/// CLI error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid record: {0}")]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("No acting account given; pass --actor or set GOVERN_ACTOR")]
    MissingActor,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
