//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::{DomainError, ErrorKind};
use crate::infrastructure::error::StoreError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Storage failure outside the taxonomy domain, passed through unmodified.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    /// Typed taxonomy failure kind, `None` for storage/config failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApplicationError::Domain(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
