//! Repository capability traits and the composing repository.
//!
//! Backends implement the narrowest capability set they support:
//! the graph store is [`Readable`] + [`Writable`] + [`Versionable`], the
//! search index is [`Readable`] + [`Writable`] + [`Queryable`]. Callers
//! depend on the trait they need, not on a concrete backend.
//!
//! [`Repository`] wires both together with the write control flow:
//! metadata → commit header, diff against the store, commit (fatal on
//! store errors), then resolve the reindex scope and push the affected
//! documents to the search index — best-effort, with failures logged and
//! swallowed so indexing never blocks the primary write path.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::commit::{Commit, CommitHeader, Diff};
use crate::error::{RepoError, SeshatResult};
use crate::index::{Filters, QueryContext, ReconcileHit, ResourceList, SearchIndex};
use crate::indexer::ResourceIndexer;
use crate::resource::Resource;
use crate::store::GraphStore;

/// Provenance metadata attached to every write: at least an author
/// identifier and an ISO-8601 timestamp.
pub type Metadata = BTreeMap<String, String>;

/// Well-known metadata keys.
pub mod metadata {
    pub const AUTHOR: &str = "author";
    pub const DATE: &str = "date";
}

/// Build a commit header from write metadata.
pub fn header_from(meta: &Metadata) -> Result<CommitHeader, RepoError> {
    let author = meta
        .get(metadata::AUTHOR)
        .ok_or_else(|| RepoError::MissingMetadata {
            field: metadata::AUTHOR.into(),
        })?;
    let date = meta
        .get(metadata::DATE)
        .ok_or_else(|| RepoError::MissingMetadata {
            field: metadata::DATE.into(),
        })?;
    let timestamp: DateTime<Utc> = date
        .parse()
        .map_err(|e: chrono::ParseError| RepoError::InvalidTimestamp {
            value: date.clone(),
            message: e.to_string(),
        })?;
    Ok(CommitHeader::new(author.clone(), timestamp))
}

/// Read capability.
pub trait Readable {
    /// Fetch a resource by identifier; `None` when absent.
    fn get_resource(&self, id: &str) -> SeshatResult<Option<Resource>>;
    /// All resources of a given type.
    fn get_all(&self, type_name: &str) -> SeshatResult<Vec<Resource>>;
}

/// Write capability.
pub trait Writable {
    fn add_resource(&self, resource: &Resource, meta: &Metadata) -> SeshatResult<()>;
    fn add_resources(&self, resources: &[Resource], meta: &Metadata) -> SeshatResult<()>;
    /// Delete a resource, returning what was removed; `None` when absent.
    fn delete_resource(&self, id: &str, meta: &Metadata) -> SeshatResult<Option<Resource>>;
}

/// Search capability.
pub trait Queryable {
    fn query(
        &self,
        q: &str,
        from: usize,
        size: Option<usize>,
        sort: Option<&str>,
        filters: &Filters,
        context: Option<&QueryContext>,
    ) -> SeshatResult<ResourceList>;
}

/// History and preview capability.
pub trait Versionable {
    /// Compute the changeset a write of this resource would apply.
    fn diff(&self, resource: &Resource) -> SeshatResult<Diff>;
    /// Apply a commit.
    fn commit(&self, commit: Commit) -> SeshatResult<()>;
    /// All commits touching `id`, in application order.
    fn log(&self, id: &str) -> Vec<Commit>;
    /// Preview a write without committing.
    fn stage(&self, resource: &Resource) -> SeshatResult<Resource>;
}

// ---------------------------------------------------------------------------
// Backend capability impls
// ---------------------------------------------------------------------------

impl Readable for GraphStore {
    fn get_resource(&self, id: &str) -> SeshatResult<Option<Resource>> {
        Ok(self.describe(id)?)
    }

    /// The graph store resolves types as full IRIs.
    fn get_all(&self, type_iri: &str) -> SeshatResult<Vec<Resource>> {
        Ok(GraphStore::get_all(self, type_iri)?)
    }
}

impl Writable for GraphStore {
    fn add_resource(&self, resource: &Resource, meta: &Metadata) -> SeshatResult<()> {
        let header = header_from(meta)?;
        let diff = self.diff(resource)?;
        self.commit(Commit::new(header, diff))
    }

    fn add_resources(&self, resources: &[Resource], meta: &Metadata) -> SeshatResult<()> {
        let header = header_from(meta)?;
        let commits = resources
            .iter()
            .map(|resource| {
                self.diff(resource)
                    .map(|diff| Commit::new(header.clone(), diff))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.commit_batch(commits)
    }

    fn delete_resource(&self, id: &str, meta: &Metadata) -> SeshatResult<Option<Resource>> {
        let header = header_from(meta)?;
        self.delete(id, header)
    }
}

impl Versionable for GraphStore {
    fn diff(&self, resource: &Resource) -> SeshatResult<Diff> {
        Ok(GraphStore::diff(self, resource)?)
    }

    fn commit(&self, commit: Commit) -> SeshatResult<()> {
        GraphStore::commit(self, commit)
    }

    fn log(&self, id: &str) -> Vec<Commit> {
        GraphStore::log(self, id)
    }

    fn stage(&self, resource: &Resource) -> SeshatResult<Resource> {
        Ok(GraphStore::stage(self, resource)?)
    }
}

impl Readable for SearchIndex {
    fn get_resource(&self, id: &str) -> SeshatResult<Option<Resource>> {
        Ok(self.get(id))
    }

    /// The index resolves types as framed type names.
    fn get_all(&self, type_name: &str) -> SeshatResult<Vec<Resource>> {
        Ok(SearchIndex::get_all(self, type_name)?)
    }
}

impl Writable for SearchIndex {
    fn add_resource(&self, resource: &Resource, meta: &Metadata) -> SeshatResult<()> {
        Ok(self.add(resource, meta)?)
    }

    fn add_resources(&self, resources: &[Resource], meta: &Metadata) -> SeshatResult<()> {
        Ok(self.add_bulk(resources, meta)?)
    }

    fn delete_resource(&self, id: &str, meta: &Metadata) -> SeshatResult<Option<Resource>> {
        Ok(self.delete(id, meta))
    }
}

impl Queryable for SearchIndex {
    fn query(
        &self,
        q: &str,
        from: usize,
        size: Option<usize>,
        sort: Option<&str>,
        filters: &Filters,
        context: Option<&QueryContext>,
    ) -> SeshatResult<ResourceList> {
        Ok(SearchIndex::query(self, q, from, size, sort, filters, context)?)
    }
}

// ---------------------------------------------------------------------------
// Composing repository
// ---------------------------------------------------------------------------

/// The composing repository: canonical graph store, derived search index,
/// and the reindex scope resolver between them.
pub struct Repository {
    store: Arc<GraphStore>,
    index: SearchIndex,
    indexer: ResourceIndexer,
}

impl Repository {
    pub fn new(store: Arc<GraphStore>, index: SearchIndex) -> Self {
        let indexer = ResourceIndexer::new(store.clone());
        Self {
            store,
            index,
            indexer,
        }
    }

    /// The canonical graph store.
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// The derived search index.
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Refresh the search documents affected by an applied diff.
    ///
    /// Best-effort: there is no transaction spanning the graph store and
    /// the index, and no retry or reconciliation job for failed index
    /// writes — a failure here leaves the index stale until the next write
    /// touching the same scope.
    fn reindex(&self, diff: &Diff, meta: &Metadata) {
        let resources = match self.indexer.resources(diff) {
            Ok(resources) => resources,
            Err(e) => {
                tracing::error!(error = %e, "failed to resolve reindex scope");
                return;
            }
        };
        if resources.is_empty() {
            return;
        }
        if let Err(e) = self.index.add_bulk(&resources, meta) {
            tracing::error!(error = %e, "failed to push reindex batch to search index");
        }
    }

    /// Entity reconciliation against the search index.
    #[allow(clippy::too_many_arguments)]
    pub fn reconcile(
        &self,
        q: &str,
        from: usize,
        size: Option<usize>,
        sort: Option<&str>,
        filters: &Filters,
        context: Option<QueryContext>,
        preferred_lang: &str,
    ) -> SeshatResult<Vec<ReconcileHit>> {
        Ok(self
            .index
            .reconcile(q, from, size, sort, filters, context, preferred_lang)?)
    }
}

impl Readable for Repository {
    fn get_resource(&self, id: &str) -> SeshatResult<Option<Resource>> {
        Ok(self.index.get(id))
    }

    fn get_all(&self, type_name: &str) -> SeshatResult<Vec<Resource>> {
        Ok(self.index.get_all(type_name)?)
    }
}

impl Writable for Repository {
    fn add_resource(&self, resource: &Resource, meta: &Metadata) -> SeshatResult<()> {
        let header = header_from(meta)?;
        let diff = self.store.diff(resource)?;
        self.store.commit(Commit::new(header, diff.clone()))?;
        self.reindex(&diff, meta);
        Ok(())
    }

    fn add_resources(&self, resources: &[Resource], meta: &Metadata) -> SeshatResult<()> {
        let header = header_from(meta)?;
        let mut combined = Diff::new();
        let commits = resources
            .iter()
            .map(|resource| {
                let diff = self.store.diff(resource)?;
                combined.append(diff.clone());
                Ok(Commit::new(header.clone(), diff))
            })
            .collect::<SeshatResult<Vec<_>>>()?;
        self.store.commit_batch(commits)?;
        self.reindex(&combined, meta);
        Ok(())
    }

    fn delete_resource(&self, id: &str, meta: &Metadata) -> SeshatResult<Option<Resource>> {
        let header = header_from(meta)?;
        let Some(removed) = self.store.delete(id, header)? else {
            return Ok(None);
        };
        self.index.delete(id, meta);

        // Neighbors whose documents referenced the deleted resource.
        let mut removal = Diff::new();
        for triple in removed.model().sorted() {
            removal.remove(triple);
        }
        self.reindex(&removal, meta);
        Ok(Some(removed))
    }
}

impl Queryable for Repository {
    fn query(
        &self,
        q: &str,
        from: usize,
        size: Option<usize>,
        sort: Option<&str>,
        filters: &Filters,
        context: Option<&QueryContext>,
    ) -> SeshatResult<ResourceList> {
        Ok(self.index.query(q, from, size, sort, filters, context)?)
    }
}

impl Versionable for Repository {
    fn diff(&self, resource: &Resource) -> SeshatResult<Diff> {
        Ok(self.store.diff(resource)?)
    }

    fn commit(&self, commit: Commit) -> SeshatResult<()> {
        self.store.commit(commit)
    }

    fn log(&self, id: &str) -> Vec<Commit> {
        self.store.log(id)
    }

    fn stage(&self, resource: &Resource) -> SeshatResult<Resource> {
        Ok(self.store.stage(resource)?)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("store", &self.store)
            .field("index", &self.index)
            .finish()
    }
}
