//! Reindex scope resolution.
//!
//! After a commit, the search documents of every resource the diff touched
//! — and of every in-namespace resource one hop away from those — may be
//! stale. [`ResourceIndexer`] computes that closure and re-fetches the
//! affected descriptions so they can be pushed to the search index.

use std::sync::Arc;

use rayon::prelude::*;

use crate::commit::Diff;
use crate::resource::Resource;
use crate::store::{GraphStore, StoreResult};

/// Resolves which resources need reindexing after a diff.
pub struct ResourceIndexer {
    store: Arc<GraphStore>,
}

impl ResourceIndexer {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    /// The set of in-namespace resource identifiers whose search documents
    /// may be stale after applying `diff`. Sorted and deduplicated.
    ///
    /// Seeds with every in-namespace IRI the diff mentions, then widens one
    /// hop in both directions: resources referencing a seed as an object,
    /// and in-namespace objects the seed references.
    pub fn scope(&self, diff: &Diff) -> StoreResult<Vec<String>> {
        let namespace = self.store.namespace().to_string();
        let seeds = diff.touched_ids(&namespace);

        let mut scope = self.store.with_model(|model| {
            let mut scope = seeds.clone();
            for seed in &seeds {
                for backlink in model.backlinks(seed) {
                    if backlink.subject.starts_with(&namespace) {
                        scope.push(backlink.subject.clone());
                    }
                }
                for triple in model.subject_triples(seed) {
                    if let Some(iri) = triple.object.as_iri() {
                        if iri.starts_with(&namespace) {
                            scope.push(iri.to_string());
                        }
                    }
                }
            }
            scope
        })?;

        scope.sort();
        scope.dedup();
        tracing::debug!(ids = scope.len(), "resolved reindex scope");
        Ok(scope)
    }

    /// Re-fetch the description of every resource in the diff's scope.
    ///
    /// Best-effort: an id whose description cannot be read is skipped with
    /// a logged failure rather than aborting the whole batch.
    pub fn resources(&self, diff: &Diff) -> StoreResult<Vec<Resource>> {
        let scope = self.scope(diff)?;
        let resources = scope
            .par_iter()
            .filter_map(|id| match self.store.describe(id) {
                Ok(Some(resource)) => Some(resource),
                Ok(None) => {
                    tracing::debug!(id, "skipping reindex of absent resource");
                    None
                }
                Err(e) => {
                    tracing::error!(id, error = %e, "could not read resource for reindexing");
                    None
                }
            })
            .collect();
        Ok(resources)
    }
}

impl std::fmt::Debug for ResourceIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceIndexer").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Commit, CommitHeader};
    use crate::graph::Triple;
    use crate::infer::InverseOntology;

    const NS: &str = "http://ex/";

    fn store() -> Arc<GraphStore> {
        Arc::new(GraphStore::in_memory(NS, Arc::new(InverseOntology::default())))
    }

    fn commit(store: &GraphStore, triples: &[Triple]) {
        let mut diff = Diff::new();
        for triple in triples {
            diff.add(triple.clone());
        }
        store
            .commit(Commit::new(
                CommitHeader::new("alice", "2024-05-01T12:00:00Z".parse().unwrap()),
                diff,
            ))
            .unwrap();
    }

    #[test]
    fn scope_includes_seeds_and_backlinking_resources() {
        let store = store();
        // A third resource references one of the diff's subjects.
        commit(&store, &[Triple::link("http://ex/3", "http://ex/q", "http://ex/1")]);

        let mut diff = Diff::new();
        diff.add(Triple::link("http://ex/1", "http://ex/p", "http://ex/2"));
        let indexer = ResourceIndexer::new(store);
        let scope = indexer.scope(&diff).unwrap();

        assert_eq!(scope, vec![
            "http://ex/1".to_string(),
            "http://ex/2".to_string(),
            "http://ex/3".to_string(),
        ]);
    }

    #[test]
    fn out_of_namespace_iris_stay_out_of_scope() {
        let store = store();
        commit(&store, &[Triple::link("http://other/9", "http://ex/q", "http://ex/1")]);

        let mut diff = Diff::new();
        diff.add(Triple::link("http://ex/1", "http://ex/p", "http://other/2"));
        let indexer = ResourceIndexer::new(store);
        let scope = indexer.scope(&diff).unwrap();

        assert_eq!(scope, vec!["http://ex/1".to_string()]);
    }

    #[test]
    fn resources_skips_absent_ids() {
        let store = store();
        commit(&store, &[Triple::link("http://ex/1", "http://ex/p", "http://ex/2")]);

        let mut diff = Diff::new();
        diff.add(Triple::link("http://ex/1", "http://ex/p", "http://ex/2"));
        // ex/2 has no triples of its own, so only ex/1 is describable.
        let indexer = ResourceIndexer::new(store);
        let resources = indexer.resources(&diff).unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id(), "http://ex/1");
    }
}
