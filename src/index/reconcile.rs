//! Entity reconciliation: a relaxed matcher for linking external records
//! to resources already in the index.
//!
//! The query is rewritten token by token — words consisting only of
//! escapable characters are dropped, remaining syntax characters are
//! escaped, and every token gets a fuzzy marker — then run with a
//! projection restricted to identifier, type and name. Hits are
//! post-processed into a compact shape where `match` is true only for an
//! exact (score 1.0) hit, signaling high-confidence equivalence for
//! automated linking.

use serde::Serialize;

use super::query::{Filters, QueryContext};
use super::{IndexResult, SearchIndex, text};

/// A reconciliation candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileHit {
    pub id: String,
    /// True only for an exact top hit (normalized score of exactly 1.0).
    #[serde(rename = "match")]
    pub matched: bool,
    /// Name in the preferred language; absent when no localized value exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
}

/// Rewrite a raw reconciliation query: drop escape-only words, escape the
/// rest, and mark every token fuzzy.
fn relax(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|word| !text::is_escape_only(word))
        .map(|word| format!("{}~", text::escape_query(word)))
        .collect::<Vec<_>>()
        .join(" ")
}

impl SearchIndex {
    /// Reconcile a free-form name against the index.
    pub fn reconcile(
        &self,
        query: &str,
        from: usize,
        size: Option<usize>,
        sort: Option<&str>,
        filters: &Filters,
        context: Option<QueryContext>,
        preferred_lang: &str,
    ) -> IndexResult<Vec<ReconcileHit>> {
        let relaxed = relax(query);
        let context = context
            .unwrap_or_default()
            .with_fetch_source(&["resource.id", "resource.type", "resource.name"]);

        let result = self.query(&relaxed, from, size, sort, filters, Some(&context))?;
        let hits = result
            .items
            .into_iter()
            .map(|hit| {
                let projected = &hit.record["resource"];
                let name = projected["name"]
                    .get(preferred_lang)
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let types = match &projected["type"] {
                    serde_json::Value::String(t) => vec![t.clone()],
                    serde_json::Value::Array(items) => items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string)
                        .take(1)
                        .collect(),
                    _ => Vec::new(),
                };
                ReconcileHit {
                    id: hit.resource.id().to_string(),
                    matched: hit.score == Some(1.0),
                    name,
                    score: hit.score,
                    types,
                }
            })
            .collect();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Model, Node, RDF_TYPE, Triple};
    use crate::index::IndexConfig;
    use crate::repo::{Metadata, metadata};
    use crate::resource::Resource;

    fn meta() -> Metadata {
        Metadata::from([
            (metadata::AUTHOR.to_string(), "alice".to_string()),
            (metadata::DATE.to_string(), "2024-05-01T12:00:00Z".to_string()),
        ])
    }

    fn person(n: usize, name_de: &str, links: usize) -> Resource {
        let id = format!("http://ex/person/{n}");
        let mut model = Model::new();
        model.insert(Triple::link(&id, RDF_TYPE, "http://schema.org/Person"));
        model.insert(Triple::new(
            &id,
            "http://schema.org/name",
            Node::literal_lang(name_de, "de"),
        ));
        for i in 0..links {
            model.insert(Triple::link(&id, "http://schema.org/knows", format!("http://ex/p/{n}/{i}")));
        }
        Resource::new(id, model)
    }

    #[test]
    fn relax_strips_and_marks_tokens() {
        assert_eq!(relax("hans :! meier"), "hans~ meier~");
        assert_eq!(relax("a:b"), "a\\:b~");
    }

    #[test]
    fn match_flag_only_for_exact_top_score() {
        let index = SearchIndex::new(IndexConfig::default());
        index.add(&person(1, "meier", 4), &meta()).unwrap();
        index.add(&person(2, "meier", 2), &meta()).unwrap();

        let hits = index
            .reconcile("meier", 0, Some(10), None, &Filters::new(), None, "de")
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].matched);
        assert_eq!(hits[0].score, Some(1.0));
        assert!(!hits[1].matched);
    }

    #[test]
    fn name_is_localized_with_absent_fallback() {
        let index = SearchIndex::new(IndexConfig::default());
        index.add(&person(1, "meier", 1), &meta()).unwrap();

        let german = index
            .reconcile("meier", 0, Some(10), None, &Filters::new(), None, "de")
            .unwrap();
        assert_eq!(german[0].name.as_deref(), Some("meier"));
        assert_eq!(german[0].types, vec!["Person".to_string()]);

        let french = index
            .reconcile("meier", 0, Some(10), None, &Filters::new(), None, "fr")
            .unwrap();
        assert!(french[0].name.is_none());
    }
}
