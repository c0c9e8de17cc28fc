//! Tests for the TOML-backed node store, driven through the service

use std::collections::BTreeSet;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;

use taxonomy::application::services::HierarchyService;
use taxonomy::application::ApplicationError;
use taxonomy::domain::{ErrorKind, NodeId, PermissionPolicy, Role};
use taxonomy::infrastructure::store::FileNodeStore;
use taxonomy::infrastructure::traits::{NodeStore, RealFileSystem};
use taxonomy::infrastructure::StoreError;
use taxonomy::util::testing::init_test_setup;

fn service_at(path: &std::path::Path) -> (Arc<FileNodeStore>, HierarchyService) {
    let store = Arc::new(FileNodeStore::new(Arc::new(RealFileSystem), path));
    let service = HierarchyService::new(store.clone(), Arc::new(PermissionPolicy::default()));
    (store, service)
}

#[test]
fn given_edits_when_reopening_store_then_tree_persisted() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxonomy.toml");
    {
        let (_, service) = service_at(&path);
        service.create("Animals", None, Role::Admin).unwrap();
        service.create("Mammals", Some(NodeId(1)), Role::Admin).unwrap();
        service.create("Dogs", Some(NodeId(2)), Role::NodeManager).unwrap();
        service.move_node(NodeId(3), None, Role::Admin).unwrap();
    }

    let (_, reopened) = service_at(&path);
    let forest = reopened.get_tree(Role::User).unwrap();

    assert_eq!(forest.len(), 3);
    assert_eq!(forest.roots().len(), 2);
    let mut files: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["taxonomy.toml", "taxonomy.toml.lock"]);
}

#[test]
fn given_deleted_nodes_when_reopening_then_id_counter_continues() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxonomy.toml");
    {
        let (_, service) = service_at(&path);
        service.create("A", None, Role::Admin).unwrap();
        service.create("B", None, Role::Admin).unwrap();
        service.delete(NodeId(2), Role::Admin).unwrap();
    }

    let (_, reopened) = service_at(&path);
    let (node, _) = reopened.create_node("C", None, Role::Admin).unwrap();

    assert_eq!(node.id, NodeId(3));
}

#[test]
fn given_two_handles_on_one_document_when_writing_then_revision_shared() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxonomy.toml");
    let (first, service) = service_at(&path);
    let (second, _) = service_at(&path);

    service.create("A", None, Role::Admin).unwrap();
    second.insert(second.revision().unwrap(), "B", None).unwrap();

    assert_eq!(first.revision().unwrap(), 2);
    assert_eq!(first.list_all().unwrap().len(), 2);
}

#[test]
fn given_handle_with_stale_revision_when_writing_then_mismatch_and_other_write_kept() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxonomy.toml");
    let (first, _) = service_at(&path);
    let (second, _) = service_at(&path);
    let seen = second.revision().unwrap();

    first.insert(first.revision().unwrap(), "A", None).unwrap();
    let err = second.insert(seen, "B", None).unwrap_err();

    assert!(
        matches!(err, StoreError::RevisionMismatch { expected: 0, actual: 1 }),
        "unexpected: {err:?}"
    );
    let names: Vec<String> = first.list_all().unwrap().into_iter().map(|n| n.name).collect();
    assert_eq!(names, vec!["A".to_string()]);
}

#[test]
fn given_two_handles_in_parallel_when_creating_then_no_write_lost_and_ids_unique() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxonomy.toml");
    let barrier = Arc::new(Barrier::new(2));

    let writers: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|side| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // separate handle and engine per thread, as two processes would have
                let (_, service) = service_at(&path);
                barrier.wait();
                for i in 0..50 {
                    let name = format!("{side}-{i}");
                    loop {
                        match service.create(&name, None, Role::Admin) {
                            Ok(_) => break,
                            Err(e) if e.kind() == Some(ErrorKind::Conflict) => continue,
                            Err(e) => panic!("create {name}: {e}"),
                        }
                    }
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer panicked");
    }

    let (store, _) = service_at(&path);
    let nodes = store.list_all().unwrap();
    let ids: BTreeSet<u64> = nodes.iter().map(|n| n.id.get()).collect();
    assert_eq!(nodes.len(), 100);
    assert_eq!(ids, (1..=100).collect::<BTreeSet<_>>());
    assert_eq!(store.revision().unwrap(), 100);
    let leftovers: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with("taxonomy.toml"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn given_garbage_document_when_reading_then_corrupt_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxonomy.toml");
    fs::write(&path, "nodes = \"not a list\"").unwrap();
    let (_, service) = service_at(&path);

    let err = service.get_tree(Role::User).unwrap_err();

    assert!(
        matches!(err, ApplicationError::Store(StoreError::Corrupt { .. })),
        "unexpected: {err:?}"
    );
    assert_eq!(err.kind(), None);
}

#[test]
fn given_hand_edited_cycle_when_reading_then_malformed_tree() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxonomy.toml");
    fs::write(
        &path,
        r#"
next_id = 3
revision = 1

[[nodes]]
id = 1
name = "A"
parent_id = 2

[[nodes]]
id = 2
name = "B"
parent_id = 1
"#,
    )
    .unwrap();
    let (_, service) = service_at(&path);

    let err = service.get_tree(Role::User).unwrap_err();

    assert_eq!(err.kind(), Some(taxonomy::domain::ErrorKind::MalformedTree));
}
