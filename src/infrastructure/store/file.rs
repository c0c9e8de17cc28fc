//! Node store persisted as a single TOML document.
//!
//! Layout:
//! ```toml
//! next_id = 4
//! revision = 7
//!
//! [[nodes]]
//! id = 1
//! name = "Animals"
//!
//! [[nodes]]
//! id = 2
//! name = "Mammals"
//! parent_id = 1
//! ```
//! Writers serialize on an advisory lock on `<path>.lock`, shared by every
//! handle and process using the document, and check the expected revision
//! under that lock. The new document is written to a temporary file in the
//! same directory and renamed over the original, so lock-free readers see
//! either the old or the new state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{Node, NodeId, NodeUpdate};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::{FileLock, FileSystem, NodeStore};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
struct StoreDocument {
    next_id: u64,
    revision: u64,
    nodes: Vec<Node>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            next_id: 1,
            revision: 0,
            nodes: Vec::new(),
        }
    }
}

impl StoreDocument {
    fn position(&self, id: NodeId) -> StoreResult<usize> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

/// File-backed node store.
pub struct FileNodeStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileNodeStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, ".lock");
        Self {
            fs,
            path,
            lock_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<FileLock> {
        self.fs.lock_exclusive(&self.lock_path).map_err(|e| {
            StoreError::unavailable(format!("lock {}", self.lock_path.display()), e)
        })
    }

    fn load(&self) -> StoreResult<StoreDocument> {
        if !self.fs.exists(&self.path) {
            return Ok(StoreDocument::default());
        }
        let content = self.fs.read_to_string(&self.path).map_err(|e| {
            StoreError::unavailable(format!("read {}", self.path.display()), e)
        })?;
        let mut doc: StoreDocument = toml::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        doc.nodes.sort_by_key(|n| n.id);
        Ok(doc)
    }

    fn save(&self, doc: &StoreDocument) -> StoreResult<()> {
        let content = toml::to_string_pretty(doc).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            message: format!("serialize: {e}"),
        })?;
        self.fs.ensure_parent(&self.path).map_err(|e| {
            StoreError::unavailable(format!("create parent of {}", self.path.display()), e)
        })?;
        self.fs
            .write_atomic(&self.path, &content)
            .map_err(|e| StoreError::unavailable(format!("write {}", self.path.display()), e))?;
        debug!("saved {} nodes, revision {}", doc.nodes.len(), doc.revision);
        Ok(())
    }

    /// Load, check the revision, mutate and save, all under the file lock.
    ///
    /// A failing `f` leaves the document untouched.
    fn modify<T>(
        &self,
        expected: u64,
        f: impl FnOnce(&mut StoreDocument) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _lock = self.lock()?;
        let mut doc = self.load()?;
        if doc.revision != expected {
            return Err(StoreError::RevisionMismatch {
                expected,
                actual: doc.revision,
            });
        }
        let result = f(&mut doc)?;
        doc.revision += 1;
        self.save(&doc)?;
        Ok(result)
    }
}

/// `<dir>/<name><suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl NodeStore for FileNodeStore {
    fn list_all(&self) -> StoreResult<Vec<Node>> {
        Ok(self.load()?.nodes)
    }

    fn get(&self, id: NodeId) -> StoreResult<Node> {
        let doc = self.load()?;
        let pos = doc.position(id)?;
        Ok(doc.nodes[pos].clone())
    }

    #[instrument(level = "debug", skip(self))]
    fn insert(&self, expected: u64, name: &str, parent_id: Option<NodeId>) -> StoreResult<Node> {
        self.modify(expected, |doc| {
            let node = Node::new(NodeId(doc.next_id), name, parent_id);
            doc.next_id += 1;
            doc.nodes.push(node.clone());
            Ok(node)
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn update(&self, expected: u64, id: NodeId, update: &NodeUpdate) -> StoreResult<Node> {
        self.modify(expected, |doc| {
            let pos = doc.position(id)?;
            update.apply_to(&mut doc.nodes[pos]);
            Ok(doc.nodes[pos].clone())
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn delete_many(&self, expected: u64, ids: &[NodeId]) -> StoreResult<()> {
        self.modify(expected, |doc| {
            for id in ids {
                doc.position(*id)?;
            }
            let doomed: BTreeSet<NodeId> = ids.iter().copied().collect();
            doc.nodes.retain(|n| !doomed.contains(&n.id));
            Ok(())
        })
    }

    fn revision(&self) -> StoreResult<u64> {
        Ok(self.load()?.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::traits::RealFileSystem;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileNodeStore {
        FileNodeStore::new(Arc::new(RealFileSystem), dir.path().join("data/taxonomy.toml"))
    }

    #[test]
    fn given_missing_file_then_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(store.revision().unwrap(), 0);
    }

    #[test]
    fn given_writes_when_reopening_then_state_and_counter_persist() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let animals = store.insert(0, "Animals", None).unwrap();
        let mammals = store.insert(1, "Mammals", Some(animals.id)).unwrap();
        store.delete_many(2, &[mammals.id]).unwrap();

        let reopened = store_in(&temp);
        let next = reopened.insert(3, "Birds", Some(animals.id)).unwrap();

        assert_eq!(next.id, NodeId(3));
        let nodes = reopened.list_all().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].parent_id, Some(animals.id));
        let mut entries: Vec<_> = std::fs::read_dir(temp.path().join("data"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["taxonomy.toml", "taxonomy.toml.lock"]);
    }

    #[test]
    fn given_stale_revision_when_writing_then_document_unchanged() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.insert(0, "Animals", None).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let err = store.insert(0, "Plants", None).unwrap_err();

        assert!(matches!(
            err,
            StoreError::RevisionMismatch {
                expected: 0,
                actual: 1
            }
        ));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn given_batch_with_missing_id_when_deleting_then_nothing_removed() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let a = store.insert(0, "A", None).unwrap();

        let err = store.delete_many(1, &[a.id, NodeId(9)]).unwrap_err();

        assert!(matches!(err, StoreError::NotFound(NodeId(9))));
        assert_eq!(store.list_all().unwrap().len(), 1);
        assert_eq!(store.revision().unwrap(), 1);
    }

    #[test]
    fn given_garbage_document_then_corrupt() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        std::fs::write(store.path(), "nodes = 12\n[[[").unwrap();

        assert!(matches!(store.list_all(), Err(StoreError::Corrupt { .. })));
    }
}
