//! Resource snapshots and search-document framing.
//!
//! A [`Resource`] is the concise bounded description of one node, produced
//! on demand by the graph store and discarded after use. The interchange
//! shape is `{id, triples: [...]}`.
//!
//! [`Resource::to_document`] frames the triple set as a denormalized JSON
//! document for the search index: predicates become fields keyed by their
//! local name, `rdf:type` becomes `type`, language-tagged literals become
//! `{lang: value}` maps, numeric literals become numbers, IRI objects are
//! nested one level deep, and a `"lat,lon"` literal under a `geo` predicate
//! becomes a `{lat, lon}` point.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::graph::{Model, Node, RDF_TYPE, Triple};

/// The concise bounded description of a node, identified by its IRI.
///
/// Immutable snapshot once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ResourceRepr", into = "ResourceRepr")]
pub struct Resource {
    id: String,
    model: Model,
}

#[derive(Serialize, Deserialize)]
struct ResourceRepr {
    id: String,
    triples: Vec<Triple>,
}

impl From<Resource> for ResourceRepr {
    fn from(resource: Resource) -> Self {
        Self {
            id: resource.id,
            triples: resource.model.sorted(),
        }
    }
}

impl From<ResourceRepr> for Resource {
    fn from(repr: ResourceRepr) -> Self {
        Self {
            id: repr.id,
            model: repr.triples.into_iter().collect(),
        }
    }
}

impl Resource {
    /// Create a resource snapshot from a model.
    pub fn new(id: impl Into<String>, model: Model) -> Self {
        Self {
            id: id.into(),
            model,
        }
    }

    /// The resource's IRI.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The underlying triple set.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Consume the snapshot, returning the triple set.
    pub fn into_model(self) -> Model {
        self.model
    }

    /// Whether the description holds no triples ("resource does not exist").
    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    /// Distinct IRIs this resource links to from its own statements.
    /// `rdf:type` objects are classification, not links.
    pub fn links(&self) -> Vec<String> {
        let mut links: Vec<String> = self
            .model
            .subject_triples(&self.id)
            .filter(|t| t.predicate != RDF_TYPE)
            .filter_map(|t| t.object.as_iri())
            .filter(|iri| *iri != self.id)
            .map(str::to_string)
            .collect();
        links.sort();
        links.dedup();
        links
    }

    /// Frame the resource as a denormalized JSON document.
    pub fn to_document(&self) -> Value {
        frame_subject(&self.model, &self.id, 1)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} triples)", self.id, self.model.len())
    }
}

/// The fragment or last path segment of an IRI.
pub fn local_name(iri: &str) -> &str {
    let tail = iri.rsplit(['#', '/']).next().unwrap_or(iri);
    if tail.is_empty() { iri } else { tail }
}

/// Frame one subject's direct statements as a JSON object.
///
/// `depth` controls nesting of IRI objects: at depth > 0 a linked node is
/// framed from its own direct triples; at depth 0 only `{id}` remains.
fn frame_subject(model: &Model, subject: &str, depth: usize) -> Value {
    let mut doc = Map::new();
    doc.insert("id".into(), Value::String(subject.to_string()));

    for triple in model.subject_triples(subject) {
        if triple.predicate == RDF_TYPE {
            if let Some(iri) = triple.object.as_iri() {
                merge_field(&mut doc, "type", Value::String(local_name(iri).to_string()));
            }
            continue;
        }
        let field = local_name(&triple.predicate).to_string();
        let value = match &triple.object {
            Node::Iri { iri } => {
                if depth > 0 && iri != subject && model.subject_triples(iri).next().is_some() {
                    frame_subject(model, iri, depth - 1)
                } else {
                    json!({ "id": iri })
                }
            }
            Node::Literal { value, lang } => frame_literal(&field, value, lang.as_deref()),
        };
        merge_field(&mut doc, &field, value);
    }

    Value::Object(doc)
}

/// Type a literal: geo points, numbers, language maps, plain strings.
fn frame_literal(field: &str, value: &str, lang: Option<&str>) -> Value {
    if let Some(lang) = lang {
        return json!({ lang: value });
    }
    if field == "geo" {
        if let Some(point) = parse_geo(value) {
            return point;
        }
    }
    if let Ok(n) = value.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = value.parse::<f64>() {
        return Value::from(n);
    }
    Value::String(value.to_string())
}

/// Parse a `"lat,lon"` literal into a `{lat, lon}` point.
fn parse_geo(value: &str) -> Option<Value> {
    let (lat, lon) = value.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    Some(json!({ "lat": lat, "lon": lon }))
}

/// Merge a value into a field: repeated predicates become arrays, and
/// language maps for the same field are merged into one object.
fn merge_field(doc: &mut Map<String, Value>, field: &str, value: Value) {
    match doc.get_mut(field) {
        None => {
            doc.insert(field.to_string(), value);
        }
        Some(Value::Object(existing)) if value.is_object() && is_lang_map(existing) => {
            if let Value::Object(incoming) = value {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
        }
        Some(Value::Array(items)) => {
            items.push(value);
        }
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// A heuristic for language maps: objects whose keys are all short language
/// tags (not `id`) and whose values are all strings.
fn is_lang_map(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map.iter().all(|(k, v)| {
            (2..=3).contains(&k.len())
                && k != "id"
                && k.chars().all(|c| c.is_ascii_lowercase())
                && v.is_string()
        })
}
