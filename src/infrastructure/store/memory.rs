//! In-process node store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{instrument, trace};

use crate::domain::{Node, NodeId, NodeUpdate};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::NodeStore;

#[derive(Debug)]
struct MemoryState {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
    revision: u64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 1,
            revision: 0,
        }
    }
}

/// Node store held entirely in memory; state ends with the process.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    state: RwLock<MemoryState>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records, bypassing any validation.
    ///
    /// The id counter continues after the highest seeded id.
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes: BTreeMap<NodeId, Node> = nodes.into_iter().map(|n| (n.id, n)).collect();
        let next_id = nodes.keys().next_back().map_or(1, |id| id.get() + 1);
        Self {
            state: RwLock::new(MemoryState {
                nodes,
                next_id,
                revision: 0,
            }),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::unavailable(
        "memory store lock",
        std::io::Error::other("lock poisoned by a panicked writer"),
    )
}

impl MemoryState {
    fn expect_revision(&self, expected: u64) -> StoreResult<()> {
        if self.revision == expected {
            Ok(())
        } else {
            Err(StoreError::RevisionMismatch {
                expected,
                actual: self.revision,
            })
        }
    }
}

impl NodeStore for MemoryNodeStore {
    fn list_all(&self) -> StoreResult<Vec<Node>> {
        Ok(self.read()?.nodes.values().cloned().collect())
    }

    fn get(&self, id: NodeId) -> StoreResult<Node> {
        self.read()?
            .nodes
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    #[instrument(level = "trace", skip(self))]
    fn insert(&self, expected: u64, name: &str, parent_id: Option<NodeId>) -> StoreResult<Node> {
        let mut state = self.write()?;
        state.expect_revision(expected)?;
        let node = Node::new(NodeId(state.next_id), name, parent_id);
        state.next_id += 1;
        state.revision += 1;
        state.nodes.insert(node.id, node.clone());
        trace!("inserted {}", node);
        Ok(node)
    }

    #[instrument(level = "trace", skip(self))]
    fn update(&self, expected: u64, id: NodeId, update: &NodeUpdate) -> StoreResult<Node> {
        let mut state = self.write()?;
        state.expect_revision(expected)?;
        let node = state.nodes.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        update.apply_to(node);
        let node = node.clone();
        state.revision += 1;
        Ok(node)
    }

    #[instrument(level = "trace", skip(self))]
    fn delete_many(&self, expected: u64, ids: &[NodeId]) -> StoreResult<()> {
        let mut state = self.write()?;
        state.expect_revision(expected)?;
        if let Some(missing) = ids.iter().find(|id| !state.nodes.contains_key(*id)) {
            return Err(StoreError::NotFound(*missing));
        }
        for id in ids {
            state.nodes.remove(id);
        }
        state.revision += 1;
        trace!("deleted {} records", ids.len());
        Ok(())
    }

    fn revision(&self) -> StoreResult<u64> {
        Ok(self.read()?.revision)
    }
}
