//! Role-based permission policy for structural mutations.
//!
//! The decision depends on role and action only; the targeted node is never
//! inspected.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::entities::{Action, Role};

/// Decides whether a role may perform an action.
pub trait Policy: Send + Sync {
    fn allowed(&self, role: Role, action: Action) -> bool;
}

/// Default grants, one row per action.
const DEFAULT_TABLE: [(Action, &[Role]); 4] = [
    (Action::Create, &[Role::Admin, Role::NodeManager]),
    (
        Action::Update,
        &[Role::Admin, Role::NodeManager, Role::NodeLead],
    ),
    (Action::Delete, &[Role::Admin]),
    (Action::Move, &[Role::Admin, Role::NodeManager]),
];

/// Table-driven policy: for each action, the set of roles granted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPolicy {
    grants: BTreeMap<Action, BTreeSet<Role>>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        let grants = DEFAULT_TABLE
            .iter()
            .map(|(action, roles)| (*action, roles.iter().copied().collect()))
            .collect();
        Self { grants }
    }
}

impl PermissionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roles granted an action.
    pub fn with_grant(mut self, action: Action, roles: impl IntoIterator<Item = Role>) -> Self {
        self.grants.insert(action, roles.into_iter().collect());
        self
    }

    /// Name-based lookup for callers holding raw action strings.
    /// Unknown actions are always denied.
    pub fn allowed_by_name(&self, role: Role, action: &str) -> bool {
        Action::parse(action).is_some_and(|action| self.allowed(role, action))
    }

    /// Effective table rows in action order.
    pub fn table(&self) -> Vec<(Action, Vec<Role>)> {
        Action::ALL
            .into_iter()
            .map(|action| {
                let roles = self
                    .grants
                    .get(&action)
                    .map(|roles| roles.iter().copied().collect())
                    .unwrap_or_default();
                (action, roles)
            })
            .collect()
    }
}

impl Policy for PermissionPolicy {
    fn allowed(&self, role: Role, action: Action) -> bool {
        self.grants
            .get(&action)
            .is_some_and(|roles| roles.contains(&role))
    }
}
