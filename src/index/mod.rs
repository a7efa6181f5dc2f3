//! The derived search index.
//!
//! A secondary, eventually-consistent document store over framed resource
//! records, supporting full-text, filtered, geo-bounded and fuzzy queries
//! with pagination, scroll cursors, and score normalization. The graph
//! store remains the source of truth; index writes are best-effort and the
//! repository layer never lets an index failure block the primary write
//! path.
//!
//! Concurrent writes for the same document key race last-write-wins; the
//! document map serializes individual upserts on its own.

pub mod query;
pub mod reconcile;
mod record;
mod scroll;
pub mod text;

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::IndexError;
use crate::repo::Metadata;
use crate::resource::Resource;

pub use query::{Filter, Filters, GeoPoint, QueryContext};
pub use reconcile::ReconcileHit;

use query::CompiledQuery;
use record::StoredRecord;
use scroll::{RawHit, ScrollStore};

/// Result type for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Tuning knobs for the search index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Maximum edit distance for fuzzy term matches.
    pub fuzziness: usize,
    /// Page size for internal scans and scroll batches.
    pub page_size: usize,
    /// Scroll cursor time-to-live, renewed on each fetch.
    pub scroll_ttl: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fuzziness: 2,
            page_size: 1024,
            scroll_ttl: Duration::from_secs(60),
        }
    }
}

/// One search hit: the resource, its (possibly projected) record, and the
/// normalized `_score` when the query was scored.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub resource: Resource,
    pub record: Value,
    pub score: Option<f64>,
}

/// An ordered result list with the total hit count and the echoed query
/// parameters, so a caller can reconstruct pagination links.
#[derive(Debug, Clone)]
pub struct ResourceList {
    pub items: Vec<SearchHit>,
    pub total: u64,
    pub query: String,
    pub from: usize,
    /// `None` is the unbounded sentinel (scroll retrieval).
    pub size: Option<usize>,
    pub sort: Option<String>,
    pub filters: Filters,
}

impl ResourceList {
    /// The resources of all hits, in result order.
    pub fn resources(&self) -> Vec<Resource> {
        self.items.iter().map(|hit| hit.resource.clone()).collect()
    }
}

/// In-process document store with an Elasticsearch-shaped query contract.
pub struct SearchIndex {
    docs: DashMap<String, StoredRecord>,
    scrolls: ScrollStore,
    config: IndexConfig,
}

impl SearchIndex {
    /// Create an empty index.
    pub fn new(config: IndexConfig) -> Self {
        let scrolls = ScrollStore::new(config.scroll_ttl, config.page_size);
        Self {
            docs: DashMap::new(),
            scrolls,
            config,
        }
    }

    /// Number of documents in the index.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Upsert one resource with metadata fields merged into its record.
    pub fn add(&self, resource: &Resource, meta: &Metadata) -> IndexResult<()> {
        let key = record::document_key(resource.id());
        let existing = self.docs.get(&key).map(|e| e.record.clone());
        let built = record::build_record(resource, meta, existing.as_ref());
        self.docs.insert(
            key,
            StoredRecord {
                resource: resource.clone(),
                record: built,
            },
        );
        tracing::debug!(id = resource.id(), "indexed resource");
        Ok(())
    }

    /// Upsert many resources as one batch.
    pub fn add_bulk(&self, resources: &[Resource], meta: &Metadata) -> IndexResult<()> {
        let total = resources.len();
        let mut failed = 0;
        for resource in resources {
            if self.add(resource, meta).is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(IndexError::Bulk { failed, total });
        }
        tracing::debug!(total, "bulk indexed resources");
        Ok(())
    }

    /// Fetch a resource payload by id. `None` when absent.
    pub fn get(&self, id: &str) -> Option<Resource> {
        let key = record::document_key(id);
        self.docs.get(&key).map(|e| e.resource.clone())
    }

    /// Delete a document, returning the resource it held. `None` when absent.
    pub fn delete(&self, id: &str, _meta: &Metadata) -> Option<Resource> {
        let key = record::document_key(id);
        let removed = self.docs.remove(&key).map(|(_, e)| e.resource);
        if removed.is_some() {
            tracing::trace!(id, "deleted document from index");
        }
        removed
    }

    /// All resources of the given (framed) type name, via a paged full scan.
    pub fn get_all(&self, type_name: &str) -> IndexResult<Vec<Resource>> {
        self.get_by_field("type", type_name)
    }

    /// All resources whose field matches a value, accumulating fixed-size
    /// pages until an empty page is returned.
    pub fn get_by_field(&self, field: &str, value: &str) -> IndexResult<Vec<Resource>> {
        let filters = Filters::from([(field.to_string(), vec![value.to_string()])]);
        let mut resources = Vec::new();
        let mut page = 0;
        loop {
            let result = self.query(
                "",
                page * self.config.page_size,
                Some(self.config.page_size),
                None,
                &filters,
                None,
            )?;
            if result.items.is_empty() {
                break;
            }
            resources.extend(result.items.into_iter().map(|hit| hit.resource));
            page += 1;
        }
        Ok(resources)
    }

    /// The general search contract.
    ///
    /// `size: None` is the unbounded sentinel: the full result set is
    /// retrieved through a server-side scroll cursor, batch by batch, and
    /// returned as one list. Otherwise a single `from`/`size` window is
    /// returned. Raw relevance scores are normalized into `[0, 1]` by the
    /// maximum score observed across the entire result set.
    pub fn query(
        &self,
        q: &str,
        from: usize,
        size: Option<usize>,
        sort: Option<&str>,
        filters: &Filters,
        context: Option<&QueryContext>,
    ) -> IndexResult<ResourceList> {
        let compiled = CompiledQuery::compile(q, sort, filters, context, self.config.fuzziness);

        let mut matched: Vec<RawHit> = self
            .docs
            .iter()
            .filter_map(|entry| {
                compiled
                    .evaluate(&entry.record)
                    .map(|score| (entry.key().clone(), entry.record.clone(), score))
            })
            .collect();
        matched.sort_by(|a, b| compiled.order(a, b));

        let total = matched.len() as u64;
        let max_score = matched
            .iter()
            .filter_map(|(_, _, s)| *s)
            .fold(0.0_f64, f64::max);

        let mut window: Vec<RawHit> = Vec::new();
        if from < matched.len() {
            matched.drain(..from);
        } else {
            matched.clear();
        }
        match size {
            Some(size) => {
                matched.truncate(size);
                window = matched;
            }
            None => {
                // Unbounded: drain the scroll cursor until an empty batch.
                let (cursor, first) = self.scrolls.open(matched);
                window.extend(first);
                loop {
                    let batch = self.scrolls.fetch(cursor)?;
                    if batch.is_empty() {
                        break;
                    }
                    window.extend(batch);
                }
            }
        }

        let fetch_source: &[String] = context.map(|c| c.fetch_source.as_slice()).unwrap_or(&[]);
        let items = window
            .into_iter()
            .filter_map(|(key, record, raw)| {
                let resource = self.docs.get(&key).map(|e| e.resource.clone())?;
                let score = raw.map(|raw| if max_score > 0.0 { raw / max_score } else { raw });
                Some(SearchHit {
                    resource,
                    record: query::apply_projection(&record, fetch_source),
                    score,
                })
            })
            .collect();

        Ok(ResourceList {
            items,
            total,
            query: q.to_string(),
            from,
            size,
            sort: sort.map(str::to_string),
            filters: filters.clone(),
        })
    }

}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("documents", &self.docs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Model, Node, RDF_TYPE, Triple};
    use crate::repo::metadata;

    const NS: &str = "http://ex/";

    fn meta() -> Metadata {
        Metadata::from([
            (metadata::AUTHOR.to_string(), "alice".to_string()),
            (metadata::DATE.to_string(), "2024-05-01T12:00:00Z".to_string()),
        ])
    }

    fn org(n: usize, name: &str, links: usize) -> Resource {
        let id = format!("{NS}org/{n}");
        let mut model = Model::new();
        model.insert(Triple::link(&id, RDF_TYPE, "http://schema.org/Organization"));
        model.insert(Triple::new(
            &id,
            "http://schema.org/name",
            Node::literal_lang(name, "en"),
        ));
        for i in 0..links {
            model.insert(Triple::link(&id, "http://schema.org/member", format!("{NS}member/{n}/{i}")));
        }
        Resource::new(id, model)
    }

    fn index_with(resources: &[Resource]) -> SearchIndex {
        let index = SearchIndex::new(IndexConfig::default());
        index.add_bulk(resources, &meta()).unwrap();
        index
    }

    #[test]
    fn add_get_delete_round_trip() {
        let index = index_with(&[org(1, "World map", 1)]);
        let fetched = index.get("http://ex/org/1").unwrap();
        assert_eq!(fetched.id(), "http://ex/org/1");

        let deleted = index.delete("http://ex/org/1", &meta()).unwrap();
        assert_eq!(deleted.id(), "http://ex/org/1");
        assert!(index.get("http://ex/org/1").is_none());
        assert!(index.delete("http://ex/org/1", &meta()).is_none());
    }

    #[test]
    fn score_normalization_tops_out_at_one() {
        // Same text relevance, link counts 4, 2, 1: raw scores 4, 2, 1.
        let index = index_with(&[
            org(1, "atlas", 4),
            org(2, "atlas", 2),
            org(3, "atlas", 1),
        ]);
        let result = index
            .query("atlas", 0, Some(10), None, &Filters::new(), None)
            .unwrap();
        let scores: Vec<f64> = result.items.iter().map(|h| h.score.unwrap()).collect();
        assert_eq!(scores, vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn default_sort_is_date_created_desc() {
        let index = SearchIndex::new(IndexConfig::default());
        let mut old_meta = meta();
        old_meta.insert(metadata::DATE.to_string(), "2020-01-01T00:00:00Z".to_string());
        index.add(&org(1, "older", 1), &old_meta).unwrap();
        index.add(&org(2, "newer", 1), &meta()).unwrap();

        let result = index
            .query("", 0, Some(10), None, &Filters::new(), None)
            .unwrap();
        assert_eq!(result.items[0].resource.id(), "http://ex/org/2");
        assert_eq!(result.items[1].resource.id(), "http://ex/org/1");
        // Field-sorted hits carry no score.
        assert!(result.items[0].score.is_none());
    }

    #[test]
    fn windowed_pagination() {
        let resources: Vec<Resource> = (0..10).map(|n| org(n, "atlas", 1)).collect();
        let index = index_with(&resources);

        let first = index
            .query("", 0, Some(4), None, &Filters::new(), None)
            .unwrap();
        assert_eq!(first.items.len(), 4);
        assert_eq!(first.total, 10);

        let rest = index
            .query("", 8, Some(4), None, &Filters::new(), None)
            .unwrap();
        assert_eq!(rest.items.len(), 2);
        assert_eq!(rest.from, 8);
    }

    #[test]
    fn scroll_returns_complete_distinct_result_set() {
        let resources: Vec<Resource> = (0..2500).map(|n| org(n, "atlas", 1)).collect();
        let index = index_with(&resources);

        let result = index
            .query("", 0, None, None, &Filters::new(), None)
            .unwrap();
        assert_eq!(result.total, 2500);
        assert_eq!(result.items.len(), 2500);

        let mut ids: Vec<&str> = result.items.iter().map(|h| h.resource.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 2500);
    }

    #[test]
    fn get_all_pages_through_everything() {
        let resources: Vec<Resource> = (0..1500).map(|n| org(n, "atlas", 1)).collect();
        let index = index_with(&resources);

        let all = index.get_all("Organization").unwrap();
        assert_eq!(all.len(), 1500);
    }

    #[test]
    fn upsert_replaces_document() {
        let index = index_with(&[org(1, "old name", 1)]);
        index.add(&org(1, "new name", 1), &meta()).unwrap();
        assert_eq!(index.len(), 1);

        let result = index
            .query("new", 0, Some(10), None, &Filters::new(), None)
            .unwrap();
        assert_eq!(result.items.len(), 1);
    }
}
