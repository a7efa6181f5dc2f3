//! Persistence and recovery tests for the graph store.
//!
//! These tests verify that the triple set and the commit log survive a
//! store restart (persist + reopen cycle), and that a reopened store keeps
//! serving diffs and deletes correctly.

use std::sync::Arc;

use seshat::graph::{Model, Node, RDF_TYPE, Triple};
use seshat::infer::InverseOntology;
use seshat::repo::{Metadata, Writable, metadata};
use seshat::resource::Resource;
use seshat::store::GraphStore;

const NS: &str = "http://ex/";

fn meta() -> Metadata {
    Metadata::from([
        (metadata::AUTHOR.to_string(), "http://ex/user/alice".to_string()),
        (metadata::DATE.to_string(), "2024-05-01T12:00:00Z".to_string()),
    ])
}

fn persistent_store(dir: &std::path::Path) -> GraphStore {
    GraphStore::open(dir, NS, Arc::new(InverseOntology::default())).unwrap()
}

fn org(n: usize, name: &str) -> Resource {
    let id = format!("{NS}org/{n}");
    let mut model = Model::new();
    model.insert(Triple::link(&id, RDF_TYPE, "http://schema.org/Organization"));
    model.insert(Triple::new(
        &id,
        "http://schema.org/name",
        Node::literal(name),
    ));
    Resource::new(id, model)
}

#[test]
fn triples_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    // First session: write and drop the store.
    {
        let store = persistent_store(dir.path());
        store.add_resource(&org(1, "World map"), &meta()).unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    // Second session: reopen and verify.
    {
        let store = persistent_store(dir.path());
        assert_eq!(store.len().unwrap(), 2);
        let described = store.describe("http://ex/org/1").unwrap().unwrap();
        assert!(described.model().contains(&Triple::new(
            "http://ex/org/1",
            "http://schema.org/name",
            Node::literal("World map"),
        )));
    }
}

#[test]
fn commit_log_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = persistent_store(dir.path());
        store.add_resource(&org(1, "first name"), &meta()).unwrap();
        store.add_resource(&org(1, "second name"), &meta()).unwrap();
    }

    let store = persistent_store(dir.path());
    let log = store.log("http://ex/org/1");
    assert_eq!(log.len(), 2);
    // Application order is preserved across the reopen.
    assert!(log[0].diff.added().any(|t| matches!(
        &t.object,
        Node::Literal { value, .. } if value == "first name"
    )));
    assert!(log[1].diff.removed().any(|t| matches!(
        &t.object,
        Node::Literal { value, .. } if value == "first name"
    )));
}

#[test]
fn updates_and_deletes_persist() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = persistent_store(dir.path());
        store.add_resource(&org(1, "keep"), &meta()).unwrap();
        store.add_resource(&org(2, "drop"), &meta()).unwrap();
        store.delete_resource("http://ex/org/2", &meta()).unwrap();
    }

    let store = persistent_store(dir.path());
    assert!(store.describe("http://ex/org/1").unwrap().is_some());
    assert!(store.describe("http://ex/org/2").unwrap().is_none());
    // The deletion commit is part of the reloaded history.
    assert_eq!(store.log("http://ex/org/2").len(), 2);
}

#[test]
fn diff_against_reopened_store_is_stable() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = persistent_store(dir.path());
        store.add_resource(&org(1, "stable"), &meta()).unwrap();
    }

    let store = persistent_store(dir.path());
    // Submitting the identical description to a reopened store must not
    // produce any changes.
    let diff = store.diff(&org(1, "stable")).unwrap();
    assert!(diff.is_empty(), "unexpected diff after reopen: {diff:?}");
}
