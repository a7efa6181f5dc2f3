//! # seshat
//!
//! A versioned RDF-triple graph store with commit history, inverse-relation
//! inference, and a derived search index that follows the canonical store.
//!
//! ## Architecture
//!
//! - **Graph model** (`graph`): value-compared triples in an indexed set
//!   with bounded-description (CBD) retrieval
//! - **Canonical store** (`store`): readers/writer-locked model with a
//!   redb-durable tier; all mutation flows through diff → commit → history
//! - **History** (`history`): append-only, per-resource-queryable commit log
//! - **Inference** (`infer`): `owl:inverseOf` enrichment from a small ontology
//! - **Reindex scope** (`indexer`): which documents a diff makes stale
//! - **Search index** (`index`): filtered, fuzzy, geo-bounded queries with
//!   scroll cursors and score normalization
//! - **Repository** (`repo`): capability traits and the write orchestration
//!
//! ## Library usage
//!
//! ```no_run
//! use seshat::config::Config;
//! use seshat::graph::{Model, Triple};
//! use seshat::repo::{Metadata, Readable, Writable, metadata};
//! use seshat::resource::Resource;
//!
//! let repo = Config::default().open().unwrap();
//! let mut model = Model::new();
//! model.insert(Triple::link(
//!     "https://seshat.dev/resource/1",
//!     "http://schema.org/member",
//!     "https://seshat.dev/resource/2",
//! ));
//! let meta = Metadata::from([
//!     (metadata::AUTHOR.to_string(), "alice".to_string()),
//!     (metadata::DATE.to_string(), "2024-05-01T12:00:00Z".to_string()),
//! ]);
//! repo.add_resource(&Resource::new("https://seshat.dev/resource/1", model), &meta)
//!     .unwrap();
//! assert!(repo.get_resource("https://seshat.dev/resource/1").unwrap().is_some());
//! ```

pub mod commit;
pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod index;
pub mod indexer;
pub mod infer;
pub mod repo;
pub mod resource;
pub mod store;
