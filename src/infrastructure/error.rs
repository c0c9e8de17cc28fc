//! Infrastructure-level errors (wraps application errors)

use std::path::PathBuf;

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::NodeId;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;

/// Failures reported by a `NodeStore`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("store unavailable: {context}")]
    Unavailable {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store document {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// A conditional write found the store at a different revision.
    #[error("store revision is {actual}, expected {expected}")]
    RevisionMismatch { expected: u64, actual: u64 },
}

impl StoreError {
    pub fn unavailable(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Unavailable {
            context: context.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
