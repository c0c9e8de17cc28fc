//! Domain layer: entities and taxonomy rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod builder;
pub mod entities;
pub mod error;
pub mod forest;
pub mod index;
pub mod path;
pub mod policy;

pub use builder::{build_forest, TreeBuilder};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use forest::{Forest, TreeNode};
pub use index::NodeIndex;
pub use path::resolve_path;
pub use policy::{PermissionPolicy, Policy};
