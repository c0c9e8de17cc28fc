//! I/O boundary traits for testability
//!
//! These traits abstract storage and filesystem access, allowing services
//! to be tested with in-memory implementations.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use fs2::FileExt;

use crate::domain::{Node, NodeId, NodeUpdate};
use crate::infrastructure::error::StoreResult;

/// Persistent home of node records.
///
/// Every write is conditional: it carries the revision the caller validated
/// against and fails with `StoreError::RevisionMismatch` if any other write
/// committed in between. The check and the write happen atomically, so two
/// writers holding the same snapshot can never both commit. Each committed
/// write bumps `revision` exactly once.
pub trait NodeStore: Send + Sync {
    /// All records in ascending id order.
    fn list_all(&self) -> StoreResult<Vec<Node>>;

    /// Fetch one record.
    fn get(&self, id: NodeId) -> StoreResult<Node>;

    /// Insert a record under a freshly assigned id.
    fn insert(&self, expected: u64, name: &str, parent_id: Option<NodeId>) -> StoreResult<Node>;

    /// Apply a partial update and return the new record.
    fn update(&self, expected: u64, id: NodeId, update: &NodeUpdate) -> StoreResult<Node>;

    /// Remove a set of records in one write. Children not listed are untouched.
    ///
    /// All ids must exist; otherwise nothing is removed.
    fn delete_many(&self, expected: u64, ids: &[NodeId]) -> StoreResult<()>;

    /// Write counter, used to detect writers racing past a snapshot.
    fn revision(&self) -> StoreResult<u64>;
}

/// Advisory lock on a file, released when dropped.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Replace a file's content atomically: readers see the old or the new file.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Block until an exclusive advisory lock on `path` is held.
    ///
    /// The lock is shared with every process locking the same path.
    fn lock_exclusive(&self, path: &Path) -> io::Result<FileLock>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn lock_exclusive(&self, path: &Path) -> io::Result<FileLock> {
        self.ensure_parent(path)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(FileLock { _file: file })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.create_dir_all(parent),
            _ => Ok(()),
        }
    }
}
