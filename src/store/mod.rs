//! The canonical graph store.
//!
//! [`GraphStore`] owns the single shared mutable triple set. The only
//! sanctioned mutation path is: compute a [`Diff`] against the current
//! state, apply it as a [`Commit`], and record the commit in history —
//! together, one logical write.
//!
//! Lock discipline: unlimited concurrent `describe` reads under a shared
//! lock; `commit` holds the exclusive lock across "commit the durable write
//! transaction" + "apply to the in-memory set", so no reader ever observes
//! a partially-applied commit. The durable transaction commits *before*
//! the in-memory apply; if it fails the write surfaces a [`StoreError`]
//! and neither the in-memory state nor the commit log is touched.

pub mod durable;

use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::commit::{Commit, CommitHeader, Diff};
use crate::error::{SeshatResult, StoreError};
use crate::graph::Model;
use crate::history::GraphHistory;
use crate::infer::InverseOntology;
use crate::resource::Resource;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The canonical triple store: in-memory indexed model, optional durable
/// redb tier, inverse-relation ontology, and commit history.
pub struct GraphStore {
    model: RwLock<Model>,
    durable: Option<Arc<durable::DurableStore>>,
    history: GraphHistory,
    inverses: Arc<InverseOntology>,
    namespace: String,
}

impl GraphStore {
    /// Create a memory-only store (no persistence).
    pub fn in_memory(namespace: impl Into<String>, inverses: Arc<InverseOntology>) -> Self {
        let namespace = namespace.into();
        Self {
            model: RwLock::new(Model::new()),
            durable: None,
            history: GraphHistory::in_memory(namespace.clone()),
            inverses,
            namespace,
        }
    }

    /// Open a persistent store, rebuilding the in-memory model and the
    /// commit history from the durable tier.
    pub fn open(
        data_dir: &Path,
        namespace: impl Into<String>,
        inverses: Arc<InverseOntology>,
    ) -> SeshatResult<Self> {
        let namespace = namespace.into();
        let durable = Arc::new(durable::DurableStore::open(data_dir)?);
        let model = durable.load_model()?;
        let history = GraphHistory::open(durable.clone(), namespace.clone())?;
        tracing::info!(
            namespace = %namespace,
            triples = model.len(),
            commits = history.len(),
            "opened graph store"
        );
        Ok(Self {
            model: RwLock::new(model),
            durable: Some(durable),
            history,
            inverses,
            namespace,
        })
    }

    /// The managed namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The inverse-relation ontology used for diff expansion.
    pub fn inverses(&self) -> &Arc<InverseOntology> {
        &self.inverses
    }

    /// Run a closure against the current model under the shared read lock.
    ///
    /// The model is never handed out by reference beyond the closure.
    pub fn with_model<R>(&self, f: impl FnOnce(&Model) -> R) -> StoreResult<R> {
        let model = self.model.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&model))
    }

    /// Number of triples currently in the store.
    pub fn len(&self) -> StoreResult<usize> {
        self.with_model(Model::len)
    }

    /// Whether the store holds no triples.
    pub fn is_empty(&self) -> StoreResult<bool> {
        self.with_model(Model::is_empty)
    }

    /// Fetch the concise bounded description of `id`.
    ///
    /// `Ok(None)` means the resource does not exist — distinct from an I/O
    /// error. Reads execute entirely inside the shared read-lock region and
    /// never observe a partially-applied commit.
    pub fn describe(&self, id: &str) -> StoreResult<Option<Resource>> {
        let cbd = self.with_model(|m| m.bounded_description(id))?;
        if cbd.is_empty() {
            return Ok(None);
        }
        Ok(Some(Resource::new(id, cbd)))
    }

    /// All resources whose `rdf:type` is the given IRI.
    pub fn get_all(&self, type_iri: &str) -> StoreResult<Vec<Resource>> {
        self.with_model(|m| {
            m.subjects_of_type(type_iri)
                .into_iter()
                .map(|id| {
                    let cbd = m.bounded_description(&id);
                    Resource::new(id, cbd)
                })
                .collect()
        })
    }

    /// Compute the changeset that would bring the store's description of
    /// this resource in line with the incoming one.
    ///
    /// Both sides are reduced to the resource's CBD and expanded with
    /// inverse relations before the symmetric difference, so declared
    /// inverses are never spuriously flagged as added or removed. Takes
    /// read locks only; never mutates the canonical store.
    pub fn diff(&self, resource: &Resource) -> StoreResult<Diff> {
        // The incoming description may carry extraneous context.
        let mut incoming = resource.model().bounded_description(resource.id());
        self.inverses.enrich(&mut incoming);

        let mut current = self.with_model(|m| m.bounded_description(resource.id()))?;
        self.inverses.enrich(&mut current);

        let mut diff = Diff::new();
        let mut added: Vec<_> = incoming.difference(&current).cloned().collect();
        added.sort();
        for triple in added {
            diff.add(triple);
        }
        let mut removed: Vec<_> = current.difference(&incoming).cloned().collect();
        removed.sort();
        for triple in removed {
            diff.remove(triple);
        }
        Ok(diff)
    }

    /// Concatenate the diffs of several resources in input order.
    pub fn diff_all(&self, resources: &[Resource]) -> StoreResult<Diff> {
        let mut combined = Diff::new();
        for resource in resources {
            combined.append(self.diff(resource)?);
        }
        Ok(combined)
    }

    /// Apply a commit: durable sync and in-memory update under one
    /// exclusive write lock, then record it in history.
    ///
    /// The history append runs after the write lock is released; a crash in
    /// between leaves a synced mutation unlogged (known limitation).
    pub fn commit(&self, commit: Commit) -> SeshatResult<()> {
        {
            let mut model = self.model.write().map_err(|_| StoreError::Poisoned)?;
            if let Some(durable) = &self.durable {
                durable.apply_diffs(&[&commit.diff])?;
            }
            commit.diff.apply(&mut model);
        }
        self.history.append(commit)?;
        Ok(())
    }

    /// Apply several commits under a single write-lock region with one
    /// durability sync for the whole batch, then record each commit
    /// individually, preserving per-commit history granularity.
    pub fn commit_batch(&self, commits: Vec<Commit>) -> SeshatResult<()> {
        {
            let mut model = self.model.write().map_err(|_| StoreError::Poisoned)?;
            if let Some(durable) = &self.durable {
                let diffs: Vec<&Diff> = commits.iter().map(|c| &c.diff).collect();
                durable.apply_diffs(&diffs)?;
            }
            for commit in &commits {
                commit.diff.apply(&mut model);
            }
        }
        for commit in commits {
            self.history.append(commit)?;
        }
        Ok(())
    }

    /// Preview the effect of writing `resource` without committing.
    ///
    /// Applies the computed diff to a copy of the current CBD, then merges
    /// in the current state of every resource the incoming description
    /// references — excluding statements whose subject is the staged
    /// resource's own id, which would otherwise be duplicated when a
    /// referenced object cites back to the resource being staged.
    pub fn stage(&self, resource: &Resource) -> StoreResult<Resource> {
        let diff = self.diff(resource)?;
        let mut dbstate = self.with_model(|m| m.bounded_description(resource.id()))?;
        diff.apply(&mut dbstate);

        // Every IRI object the incoming description references.
        let mut referenced: Vec<&str> = resource
            .model()
            .subject_triples(resource.id())
            .filter_map(|t| t.object.as_iri())
            .filter(|iri| *iri != resource.id())
            .collect();
        referenced.sort_unstable();
        referenced.dedup();

        for link in referenced {
            let linked = self.with_model(|m| m.bounded_description(link))?;
            for triple in linked.iter() {
                if triple.subject != resource.id() {
                    dbstate.insert(triple.clone());
                }
            }
        }

        Ok(Resource::new(resource.id(), dbstate))
    }

    /// Remove a resource: its own statements plus every backlink pointing
    /// at it, inverse-expanded, as one logged removal commit. Statements of
    /// neighboring resources are left in place.
    ///
    /// Returns the description that was removed, or `None` if the id had
    /// no triples.
    pub fn delete(&self, id: &str, header: CommitHeader) -> SeshatResult<Option<Resource>> {
        let mut dbstate = self.with_model(|m| {
            let mut state: Model = m.subject_triples(id).cloned().collect();
            for backlink in m.backlinks(id) {
                state.insert(backlink.clone());
            }
            state
        })?;
        if dbstate.is_empty() {
            return Ok(None);
        }
        self.inverses.enrich(&mut dbstate);

        let mut diff = Diff::new();
        for triple in dbstate.sorted() {
            diff.remove(triple);
        }

        self.commit(Commit::new(header, diff))?;
        tracing::debug!(id, "deleted resource from graph store");
        Ok(Some(Resource::new(id, dbstate)))
    }

    /// All commits touching `id`, in application order.
    pub fn log(&self, id: &str) -> Vec<Commit> {
        self.history.log(id)
    }

    /// Total number of commits recorded.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("namespace", &self.namespace)
            .field("persistent", &self.durable.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, Triple};

    const NS: &str = "http://ex/";
    const KNOWS: &str = "http://xmlns.com/foaf/0.1/knows";
    const KNOWN_BY: &str = "http://xmlns.com/foaf/0.1/knownBy";

    fn header() -> CommitHeader {
        CommitHeader::new("alice", "2024-05-01T12:00:00Z".parse().unwrap())
    }

    fn plain_store() -> GraphStore {
        GraphStore::in_memory(NS, Arc::new(InverseOntology::default()))
    }

    fn store_with_inverses() -> GraphStore {
        GraphStore::in_memory(NS, Arc::new(InverseOntology::from_pairs([(KNOWS, KNOWN_BY)])))
    }

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::link(s, p, o)
    }

    fn resource(id: &str, triples: &[Triple]) -> Resource {
        Resource::new(id, triples.iter().cloned().collect())
    }

    #[test]
    fn commit_then_describe_round_trip() {
        let store = plain_store();
        let mut diff = Diff::new();
        diff.add(t("http://ex/1", "http://ex/p", "http://ex/2"));
        store.commit(Commit::new(header(), diff)).unwrap();

        let described = store.describe("http://ex/1").unwrap().unwrap();
        assert!(described.model().contains(&t("http://ex/1", "http://ex/p", "http://ex/2")));
    }

    #[test]
    fn removing_absent_triple_changes_nothing() {
        let store = plain_store();
        let mut setup = Diff::new();
        setup.add(t("http://ex/1", "http://ex/p", "http://ex/2"));
        store.commit(Commit::new(header(), setup)).unwrap();

        let mut removal = Diff::new();
        removal.remove(t("http://ex/9", "http://ex/q", "http://ex/8"));
        store.commit(Commit::new(header(), removal)).unwrap();

        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn describe_missing_resource_is_none() {
        let store = plain_store();
        assert!(store.describe("http://ex/ghost").unwrap().is_none());
    }

    #[test]
    fn diff_of_matching_description_is_empty() {
        let store = store_with_inverses();
        let triple = t("http://ex/1", KNOWS, "http://ex/2");
        let mut diff = Diff::new();
        diff.add(triple.clone());
        diff.add(t("http://ex/2", KNOWN_BY, "http://ex/1"));
        store.commit(Commit::new(header(), diff)).unwrap();

        // Incoming description asserts only the forward edge; the inverse
        // must be treated as already implied.
        let incoming = resource("http://ex/1", &[triple]);
        let diff = store.diff(&incoming).unwrap();
        assert!(diff.is_empty(), "unexpected diff: {diff:?}");
    }

    #[test]
    fn diff_detects_adds_and_removes() {
        let store = plain_store();
        let mut setup = Diff::new();
        setup.add(t("http://ex/1", "http://ex/p", "http://ex/2"));
        setup.add(Triple::new("http://ex/1", "http://ex/name", Node::literal("old")));
        store.commit(Commit::new(header(), setup)).unwrap();

        let incoming = resource(
            "http://ex/1",
            &[
                t("http://ex/1", "http://ex/p", "http://ex/2"),
                Triple::new("http://ex/1", "http://ex/name", Node::literal("new")),
            ],
        );
        let diff = store.diff(&incoming).unwrap();
        assert_eq!(diff.added().count(), 1);
        assert_eq!(diff.removed().count(), 1);
        assert!(diff.removed().any(|t| matches!(&t.object, Node::Literal { value, .. } if value == "old")));
    }

    #[test]
    fn diff_leaves_unrelated_resources_untouched() {
        let store = plain_store();
        let mut setup = Diff::new();
        setup.add(t("http://ex/other", "http://ex/p", "http://ex/elsewhere"));
        store.commit(Commit::new(header(), setup)).unwrap();

        let incoming = resource(
            "http://ex/1",
            &[t("http://ex/1", "http://ex/p", "http://ex/2")],
        );
        let diff = store.diff(&incoming).unwrap();
        assert_eq!(diff.removed().count(), 0);
    }

    #[test]
    fn diff_all_concatenates_in_input_order() {
        let store = plain_store();
        let resources = [
            resource("http://ex/1", &[t("http://ex/1", "http://ex/p", "http://ex/2")]),
            resource("http://ex/3", &[t("http://ex/3", "http://ex/p", "http://ex/4")]),
        ];
        let combined = store.diff_all(&resources).unwrap();
        let added: Vec<_> = combined.added().collect();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].subject, "http://ex/1");
        assert_eq!(added[1].subject, "http://ex/3");
    }

    #[test]
    fn batch_commit_keeps_per_commit_history() {
        let store = plain_store();
        let mut first = Diff::new();
        first.add(t("http://ex/1", "http://ex/p", "http://ex/2"));
        let mut second = Diff::new();
        second.add(t("http://ex/1", "http://ex/q", "http://ex/3"));

        store
            .commit_batch(vec![
                Commit::new(header(), first),
                Commit::new(header(), second),
            ])
            .unwrap();

        assert_eq!(store.log("http://ex/1").len(), 2);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn stage_previews_without_committing() {
        let store = plain_store();
        let mut setup = Diff::new();
        setup.add(Triple::new("http://ex/2", "http://ex/name", Node::literal("two")));
        store.commit(Commit::new(header(), setup)).unwrap();

        let incoming = resource(
            "http://ex/1",
            &[t("http://ex/1", "http://ex/p", "http://ex/2")],
        );
        let staged = store.stage(&incoming).unwrap();

        assert!(staged.model().contains(&t("http://ex/1", "http://ex/p", "http://ex/2")));
        assert!(staged.model().contains(&Triple::new(
            "http://ex/2",
            "http://ex/name",
            Node::literal("two"),
        )));
        // Not committed: the store itself still knows nothing about ex/1.
        assert!(store.describe("http://ex/1").unwrap().is_none());
    }

    #[test]
    fn stage_excludes_self_referencing_statements_of_linked_objects() {
        let store = plain_store();
        let mut setup = Diff::new();
        // The referenced object cites back to the resource being staged, so
        // its bounded description carries ex/1's (soon removed) statement.
        setup.add(t("http://ex/2", "http://ex/cites", "http://ex/1"));
        setup.add(t("http://ex/1", "http://ex/stale", "http://ex/9"));
        store.commit(Commit::new(header(), setup)).unwrap();

        let incoming = resource(
            "http://ex/1",
            &[t("http://ex/1", "http://ex/p", "http://ex/2")],
        );
        let staged = store.stage(&incoming).unwrap();
        // The stale statement about ex/1 was removed by the diff and must not
        // be re-imported through the merge of ex/2's neighborhood.
        assert!(!staged.model().contains(&t("http://ex/1", "http://ex/stale", "http://ex/9")));
        assert!(staged.model().contains(&t("http://ex/2", "http://ex/cites", "http://ex/1")));
    }

    #[test]
    fn delete_removes_cbd_and_backlinks() {
        let store = plain_store();
        let mut setup = Diff::new();
        setup.add(t("http://ex/1", "http://ex/p", "http://ex/2"));
        setup.add(t("http://ex/3", "http://ex/q", "http://ex/1"));
        store.commit(Commit::new(header(), setup)).unwrap();

        let deleted = store.delete("http://ex/1", header()).unwrap().unwrap();
        assert_eq!(deleted.id(), "http://ex/1");

        assert!(store.describe("http://ex/1").unwrap().is_none());
        // The backlink from ex/3 is gone too.
        assert!(store.describe("http://ex/3").unwrap().is_none());
        // Deletion is logged.
        assert!(!store.log("http://ex/1").is_empty());
    }

    #[test]
    fn delete_missing_resource_is_none() {
        let store = plain_store();
        assert!(store.delete("http://ex/ghost", header()).unwrap().is_none());
    }
}
