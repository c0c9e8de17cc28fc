//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{Action, ErrorKind, NodeId, Role};

/// Domain errors represent taxonomy rule violations.
/// These are independent of storage concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("role '{role}' may not {action} nodes")]
    Forbidden { role: Role, action: Action },

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("moving node {node} under {new_parent} would create a cycle")]
    Cycle { node: NodeId, new_parent: NodeId },

    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("stored hierarchy is malformed: {0}")]
    MalformedTree(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Forbidden { .. } => ErrorKind::Forbidden,
            DomainError::NodeNotFound(_) => ErrorKind::NotFound,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::Cycle { .. } => ErrorKind::Cycle,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::MalformedTree(_) => ErrorKind::MalformedTree,
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
