//! Error types for AtlasPipe
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::backend::ConnectionId;

/// Result type alias using PipeError
pub type Result<T> = std::result::Result<T, PipeError>;

/// Unified error type for AtlasPipe operations
#[derive(Debug, Error)]
pub enum PipeError {
    // -------------------------------------------------------------------------
    // Conversion Errors
    // -------------------------------------------------------------------------
    /// Raw backend data could not be converted into an in-memory value
    #[error("Conversion error: {0}")]
    Conversion(String),

    // -------------------------------------------------------------------------
    // Backend Execution Errors
    // -------------------------------------------------------------------------
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Command #{index} failed: {message}")]
    CommandFailed { index: usize, message: String },

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("Batch returned {actual} results for {expected} queued commands")]
    ResultCountMismatch { expected: usize, actual: usize },

    #[error("Batch already executed")]
    BatchConsumed,

    /// A group's round trip failed; carries the group's connection
    #[error("Execution failed on {connection}: {source}")]
    Execution {
        connection: ConnectionId,
        #[source]
        source: Box<PipeError>,
    },

    #[error("Worker for {connection} panicked")]
    WorkerPanicked { connection: ConnectionId },

    // -------------------------------------------------------------------------
    // Dispatch Errors
    // -------------------------------------------------------------------------
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing primary key value")]
    MissingPrimaryKey,

    #[error("Response already settled")]
    AlreadySettled,

    #[error("NOSCRIPT No matching script")]
    UnknownScript,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipeError {
    /// Connection the failure was tagged with, if the engine tagged it
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            PipeError::Execution { connection, .. } | PipeError::WorkerPanicked { connection } => {
                Some(*connection)
            }
            _ => None,
        }
    }

    /// The untagged failure underneath an `Execution` wrapper
    pub fn root(&self) -> &PipeError {
        match self {
            PipeError::Execution { source, .. } => source.root(),
            other => other,
        }
    }
}
