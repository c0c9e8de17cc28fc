//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::ErrorKind;
use crate::exitcode;
use crate::infrastructure::{InfraError, StoreError};

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Taxonomy failure kind, if this is a typed domain failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CliError::Infra(InfraError::Application(e)) => e.kind(),
            _ => None,
        }
    }

    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if let Some(kind) = self.kind() {
            return match kind {
                ErrorKind::Forbidden => exitcode::NOPERM,
                ErrorKind::NotFound => exitcode::NOINPUT,
                ErrorKind::Validation | ErrorKind::Cycle | ErrorKind::MalformedTree => {
                    exitcode::DATAERR
                }
                ErrorKind::Conflict => exitcode::TEMPFAIL,
            };
        }
        match self {
            CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => exitcode::IOERR,
                InfraError::Application(ApplicationError::Config { .. }) => exitcode::CONFIG,
                InfraError::Application(ApplicationError::Store(StoreError::Corrupt { .. })) => {
                    exitcode::DATAERR
                }
                InfraError::Application(ApplicationError::Store(_)) => exitcode::IOERR,
                InfraError::Application(_) => exitcode::SOFTWARE,
            },
        }
    }
}
