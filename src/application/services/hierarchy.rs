//! Hierarchy service
//!
//! Validates and applies structural edits to the taxonomy. Every mutation is a
//! read-validate-write sequence against one snapshot of the store. The write is
//! conditional on the snapshot's revision, so a mutation either commits fully
//! or leaves the store as it was, even with other engines on the same store.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    normalize_name, resolve_path, Action, DomainError, Forest, Node, NodeId, NodeIndex,
    NodeUpdate, Policy, Role, TreeBuilder,
};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::traits::NodeStore;

/// Result of a cascading delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Removed ids: the target first, then its descendants breadth-first
    pub removed: Vec<NodeId>,
    pub forest: Forest,
}

/// One search match with its root-to-node path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub node: Node,
    pub path: Vec<Node>,
}

/// Consistent view of the store taken before validation.
struct Snapshot {
    nodes: Vec<Node>,
    revision: u64,
}

/// Service orchestrating taxonomy edits and reads.
pub struct HierarchyService {
    store: Arc<dyn NodeStore>,
    policy: Arc<dyn Policy>,
    builder: TreeBuilder,
    write_lock: Mutex<()>,
}

impl HierarchyService {
    /// Create a new hierarchy service.
    pub fn new(store: Arc<dyn NodeStore>, policy: Arc<dyn Policy>) -> Self {
        Self {
            store,
            policy,
            builder: TreeBuilder::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a node and return the refreshed forest.
    pub fn create(
        &self,
        name: &str,
        parent_id: Option<NodeId>,
        role: Role,
    ) -> ApplicationResult<Forest> {
        self.create_node(name, parent_id, role)
            .map(|(_, forest)| forest)
    }

    /// Create a node; returns the stored record along with the refreshed forest.
    #[instrument(level = "debug", skip(self))]
    pub fn create_node(
        &self,
        name: &str,
        parent_id: Option<NodeId>,
        role: Role,
    ) -> ApplicationResult<(Node, Forest)> {
        self.authorize(role, Action::Create)?;
        let name = validate_name(name)?;

        let _guard = self.lock_writes();
        let snapshot = self.snapshot()?;
        if let Some(parent) = parent_id {
            NodeIndex::new(&snapshot.nodes).require(parent)?;
        }

        let node = self
            .store
            .insert(snapshot.revision, &name, parent_id)
            .map_err(write_failure)?;
        info!("created {} under {:?}", node, parent_id);

        Ok((node, self.current_forest()?))
    }

    /// Change a node's name; its position is untouched.
    #[instrument(level = "debug", skip(self))]
    pub fn rename(&self, id: NodeId, new_name: &str, role: Role) -> ApplicationResult<Forest> {
        self.authorize(role, Action::Update)?;

        let _guard = self.lock_writes();
        let snapshot = self.snapshot()?;
        NodeIndex::new(&snapshot.nodes).require(id)?;
        let name = validate_name(new_name)?;

        let node = self
            .store
            .update(snapshot.revision, id, &NodeUpdate::rename(name))
            .map_err(write_failure)?;
        info!("renamed node {} to '{}'", id, node.name);

        self.current_forest()
    }

    /// Delete a node together with its whole subtree.
    ///
    /// The whole closure is removed in one store write, so the store never holds
    /// a record whose parent is already gone. The caller clears any selection
    /// pointing at one of `removed`.
    #[instrument(level = "debug", skip(self))]
    pub fn delete(&self, id: NodeId, role: Role) -> ApplicationResult<DeleteOutcome> {
        self.authorize(role, Action::Delete)?;

        let _guard = self.lock_writes();
        let snapshot = self.snapshot()?;
        let removed = NodeIndex::new(&snapshot.nodes).subtree(id)?;
        debug!("delete: node {} closure has {} ids", id, removed.len());

        self.store
            .delete_many(snapshot.revision, &removed)
            .map_err(write_failure)?;
        info!("deleted node {} and {} descendants", id, removed.len() - 1);

        Ok(DeleteOutcome {
            removed,
            forest: self.current_forest()?,
        })
    }

    /// Reparent a node; `None` makes it a root. Its subtree moves along.
    ///
    /// Self-parenting is rejected before the permission check since it needs no
    /// store access and is invalid for every role.
    #[instrument(level = "debug", skip(self))]
    pub fn move_node(
        &self,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        role: Role,
    ) -> ApplicationResult<Forest> {
        if new_parent_id == Some(id) {
            return Err(DomainError::Cycle {
                node: id,
                new_parent: id,
            }
            .into());
        }
        self.authorize(role, Action::Move)?;

        let _guard = self.lock_writes();
        let snapshot = self.snapshot()?;
        let index = NodeIndex::new(&snapshot.nodes);
        let node = index.require(id)?;
        if let Some(parent) = new_parent_id {
            index.require(parent)?;
            if index.is_ancestor_of(id, parent)? {
                return Err(DomainError::Cycle {
                    node: id,
                    new_parent: parent,
                }
                .into());
            }
        }

        if node.parent_id == new_parent_id {
            debug!("move: node {} already under {:?}", id, new_parent_id);
            return self.current_forest();
        }

        self.store
            .update(snapshot.revision, id, &NodeUpdate::reparent(new_parent_id))
            .map_err(write_failure)?;
        info!("moved node {} under {:?}", id, new_parent_id);

        self.current_forest()
    }

    /// Current forest. Readable by every authenticated role.
    #[instrument(level = "debug", skip(self))]
    pub fn get_tree(&self, role: Role) -> ApplicationResult<Forest> {
        self.current_forest()
    }

    /// Root-to-node chain, empty when the id is unknown.
    #[instrument(level = "debug", skip(self))]
    pub fn get_path(&self, id: NodeId, role: Role) -> ApplicationResult<Vec<Node>> {
        let forest = self.current_forest()?;
        Ok(resolve_path(&forest, id))
    }

    /// Fetch a single node record.
    #[instrument(level = "debug", skip(self))]
    pub fn get_node(&self, id: NodeId, role: Role) -> ApplicationResult<Node> {
        self.store.get(id).map_err(|e| match e {
            StoreError::NotFound(id) => DomainError::NodeNotFound(id).into(),
            other => other.into(),
        })
    }

    /// Case-insensitive substring search over node names, ascending id order.
    #[instrument(level = "debug", skip(self))]
    pub fn search(&self, query: &str, role: Role) -> ApplicationResult<Vec<SearchHit>> {
        let needle = normalize_name(query)
            .ok_or_else(|| DomainError::Validation("search query must not be empty".into()))?
            .to_lowercase();

        let nodes = self.store.list_all()?;
        let forest = self.builder.build(&nodes)?;
        let hits: Vec<SearchHit> = nodes
            .into_iter()
            .filter(|n| n.name.to_lowercase().contains(&needle))
            .map(|node| {
                let path = resolve_path(&forest, node.id);
                SearchHit { node, path }
            })
            .collect();
        debug!("search '{}': {} hits", needle, hits.len());
        Ok(hits)
    }

    fn authorize(&self, role: Role, action: Action) -> ApplicationResult<()> {
        if self.policy.allowed(role, action) {
            Ok(())
        } else {
            warn!("denied: role {} may not {}", role, action);
            Err(DomainError::Forbidden { role, action }.into())
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), nothing to repair after a panic
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> ApplicationResult<Snapshot> {
        let revision = self.store.revision()?;
        let nodes = self.store.list_all()?;
        let after = self.store.revision()?;
        if after != revision {
            return Err(DomainError::Conflict(format!(
                "store changed while reading (revision {revision} -> {after})"
            ))
            .into());
        }
        Ok(Snapshot { nodes, revision })
    }

    fn current_forest(&self) -> ApplicationResult<Forest> {
        let nodes = self.store.list_all()?;
        Ok(self.builder.build(&nodes)?)
    }
}

fn validate_name(name: &str) -> ApplicationResult<String> {
    normalize_name(name)
        .ok_or_else(|| DomainError::Validation("node name must not be empty".into()).into())
}

/// Failure of a conditional write after validation passed.
///
/// A moved revision or a vanished record both mean another writer committed
/// since the snapshot.
fn write_failure(e: StoreError) -> ApplicationError {
    match e {
        StoreError::RevisionMismatch { expected, actual } => {
            warn!("conflict: revision {} -> {} since validation", expected, actual);
            DomainError::Conflict(format!(
                "store changed since validation (revision {expected} -> {actual})"
            ))
            .into()
        }
        StoreError::NotFound(id) => {
            DomainError::Conflict(format!("node {id} was removed concurrently")).into()
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, PermissionPolicy};
    use crate::infrastructure::store::MemoryNodeStore;

    fn service() -> HierarchyService {
        HierarchyService::new(
            Arc::new(MemoryNodeStore::new()),
            Arc::new(PermissionPolicy::default()),
        )
    }

    #[test]
    fn given_padded_name_when_creating_then_stored_trimmed() {
        let service = service();

        let (node, forest) = service.create_node("  Animals  ", None, Role::Admin).unwrap();

        assert_eq!(node.name, "Animals");
        assert_eq!(forest.roots()[0].node.name, "Animals");
    }

    #[test]
    fn given_forbidden_role_when_validating_then_forbidden_wins_over_validation() {
        let service = service();

        let err = service.create("", None, Role::User).unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Forbidden));
    }

    #[test]
    fn given_current_parent_when_moving_then_noop_without_write() {
        let store = Arc::new(MemoryNodeStore::new());
        let service = HierarchyService::new(store.clone(), Arc::new(PermissionPolicy::default()));
        let (root, _) = service.create_node("Animals", None, Role::Admin).unwrap();
        let (child, _) = service.create_node("Mammals", Some(root.id), Role::Admin).unwrap();
        let before = store.revision().unwrap();

        service.move_node(child.id, Some(root.id), Role::Admin).unwrap();

        assert_eq!(store.revision().unwrap(), before);
    }
}
