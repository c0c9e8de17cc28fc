//! Service container for dependency injection
//!
//! Wires up the store, policy and hierarchy service from settings.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::HierarchyService;
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::Policy;
use crate::infrastructure::store::FileNodeStore;
use crate::infrastructure::traits::{FileSystem, NodeStore, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Node store backing the taxonomy
    pub store: Arc<dyn NodeStore>,

    /// Effective permission policy
    pub policy: Arc<dyn Policy>,

    hierarchy: HierarchyService,
}

impl ServiceContainer {
    /// Create a container with the file store named in the settings.
    pub fn new(settings: Settings) -> ApplicationResult<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let store = Arc::new(FileNodeStore::new(fs.clone(), settings.store_path.clone()));
        Self::with_deps(settings, fs, store)
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn NodeStore>,
    ) -> ApplicationResult<Self> {
        let policy: Arc<dyn Policy> = Arc::new(settings.permission_policy()?);
        debug!("store: {}", settings.store_path.display());
        let hierarchy = HierarchyService::new(store.clone(), policy.clone());

        Ok(Self {
            settings: Arc::new(settings),
            fs,
            store,
            policy,
            hierarchy,
        })
    }

    pub fn hierarchy(&self) -> &HierarchyService {
        &self.hierarchy
    }
}
