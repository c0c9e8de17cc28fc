//! Taxonomy hierarchy engine.
//!
//! Nodes live in a flat parent-pointer store ([`infrastructure::traits::NodeStore`]);
//! the [`application::services::HierarchyService`] validates every structural edit
//! against a snapshot of that store, gates it through a [`domain::Policy`], and
//! hands back a freshly built [`domain::Forest`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
