use std::sync::{Arc, Once};

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::application::services::HierarchyService;
use crate::domain::{NodeId, PermissionPolicy, Role};
use crate::infrastructure::store::MemoryNodeStore;

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");

    // RUST_LOG wins, otherwise debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// In-memory service seeded with the Animals > Mammals > Dogs chain (ids 1, 2, 3).
pub fn animals_fixture() -> (Arc<MemoryNodeStore>, HierarchyService) {
    let store = Arc::new(MemoryNodeStore::new());
    let service = HierarchyService::new(store.clone(), Arc::new(PermissionPolicy::default()));
    for (name, parent) in [("Animals", None), ("Mammals", Some(1)), ("Dogs", Some(2))] {
        service
            .create(name, parent.map(NodeId), Role::Admin)
            .unwrap_or_else(|e| panic!("seed {name}: {e}"));
    }
    (store, service)
}
