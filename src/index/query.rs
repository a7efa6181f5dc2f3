//! Query compilation and evaluation over stored records.
//!
//! A caller's query — free text, filters, sort order, and optional
//! [`QueryContext`] refinements — is compiled once into a [`CompiledQuery`]
//! and then evaluated against each stored record. Field paths are dotted
//! (`location.geo`); they resolve against the record's top level first and
//! fall back to the `resource` slot, so `type` and `resource.type` name the
//! same field.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::text;

/// Filter map wire convention: field name → acceptable values (OR within a
/// key, AND across keys; a `.GTE` key suffix switches to a range bound).
pub type Filters = BTreeMap<String, Vec<String>>;

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One mandatory filter clause.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Exact term match on a field.
    Term { field: String, value: String },
    /// Greater-or-equal range bound on a field.
    Gte { field: String, value: String },
    /// Any of the nested clauses (OR). An empty group matches nothing.
    Any(Vec<Filter>),
}

impl Filter {
    /// Build a clause from a filter-map key: a `.GTE` suffix selects a
    /// range bound on the stripped field name.
    pub fn from_entry(field: &str, value: &str) -> Self {
        match field.strip_suffix(".GTE") {
            Some(stripped) => Filter::Gte {
                field: stripped.to_string(),
                value: value.to_string(),
            },
            None => Filter::Term {
                field: field.to_string(),
                value: value.to_string(),
            },
        }
    }

    fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::Term { field, value } => {
                scalars_at(record, field).iter().any(|v| scalar_eq(v, value))
            }
            Filter::Gte { field, value } => {
                scalars_at(record, field).iter().any(|v| scalar_gte(v, value))
            }
            Filter::Any(group) => group.iter().any(|f| f.matches(record)),
        }
    }
}

/// Optional caller-supplied query refinements.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Restrict returned record fields to these paths (empty = all).
    pub fetch_source: Vec<String>,
    /// Extra mandatory filter clauses.
    pub filters: Vec<Filter>,
    /// Field boosts in `"field^weight"` syntax.
    pub field_boosts: Vec<String>,
    /// Geo bounding box: top-left corner.
    pub zoom_top_left: Option<GeoPoint>,
    /// Geo bounding box: bottom-right corner.
    pub zoom_bottom_right: Option<GeoPoint>,
    /// Geo polygon (at least three corners to take effect).
    pub polygon: Vec<GeoPoint>,
}

impl QueryContext {
    pub fn with_fetch_source(mut self, fields: &[&str]) -> Self {
        self.fetch_source = fields.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Sort convention: `"<field>:<ASC|DESC>"`.
#[derive(Debug, Clone)]
struct SortKey {
    field: String,
    ascending: bool,
}

/// Parse a sort string; an unparseable one is logged and ignored.
fn parse_sort(sort: &str) -> Option<SortKey> {
    let parts: Vec<&str> = sort.split(':').collect();
    if parts.len() != 2 {
        tracing::trace!(sort, "invalid sort string");
        return None;
    }
    let ascending = match parts[1].to_uppercase().as_str() {
        "ASC" => true,
        "DESC" => false,
        _ => {
            tracing::trace!(sort, "invalid sort direction");
            return None;
        }
    };
    Some(SortKey {
        field: parts[0].to_string(),
        ascending,
    })
}

/// Parse a `"field^weight"` boost; malformed boosts are logged and skipped.
fn parse_boost(boost: &str) -> Option<(String, f64)> {
    let (field, weight) = match boost.split_once('^') {
        Some(parts) => parts,
        None => {
            tracing::trace!(boost, "invalid field boost");
            return None;
        }
    };
    match weight.parse::<f64>() {
        Ok(weight) => Some((field.to_string(), weight)),
        Err(_) => {
            tracing::trace!(boost, "invalid field boost weight");
            None
        }
    }
}

/// The field a geo constraint applies to.
const GEO_FIELD: &str = "location.geo";

/// The popularity field multiplied into relevance scores.
const LINK_COUNT_FIELD: &str = "linkCount";

/// A query compiled for evaluation against stored records.
#[derive(Debug, Clone)]
pub(crate) struct CompiledQuery {
    terms: Vec<String>,
    boosts: Vec<(String, f64)>,
    clauses: Vec<Filter>,
    geo_box: Option<(GeoPoint, GeoPoint)>,
    polygon: Vec<GeoPoint>,
    sort: Option<SortKey>,
    fuzziness: usize,
}

impl CompiledQuery {
    /// Compile query text, filters, sort order and context refinements.
    pub(crate) fn compile(
        query: &str,
        sort_order: Option<&str>,
        filters: &Filters,
        context: Option<&QueryContext>,
        fuzziness: usize,
    ) -> Self {
        // Sort by creation date if no query string and no explicit order given.
        let effective_sort = if query.is_empty() && sort_order.is_none() {
            Some("dateCreated:DESC")
        } else {
            sort_order
        };
        let sort = effective_sort.and_then(parse_sort);

        let mut clauses: Vec<Filter> = Vec::new();
        for (field, values) in filters {
            // Values within one field are OR-ed; the index evaluates each
            // key's clause group as "any of".
            let group: Vec<Filter> = values
                .iter()
                .map(|value| Filter::from_entry(field, value))
                .collect();
            clauses.push(Filter::Any(group));
        }

        let mut boosts = Vec::new();
        let mut geo_box = None;
        let mut polygon = Vec::new();
        if let Some(context) = context {
            clauses.extend(context.filters.iter().cloned());
            boosts = context
                .field_boosts
                .iter()
                .filter_map(|b| parse_boost(b))
                .collect();
            if let (Some(tl), Some(br)) = (context.zoom_top_left, context.zoom_bottom_right) {
                geo_box = Some((tl, br));
            }
            if context.polygon.len() >= 3 {
                polygon = context.polygon.clone();
            }
        }

        let escaped = text::escape_trailing_special(query);
        let terms = text::tokenize(&escaped);

        Self {
            terms,
            boosts,
            clauses,
            geo_box,
            polygon,
            sort,
            fuzziness,
        }
    }

    /// Whether hits carry relevance scores: a non-empty text query ranked
    /// by relevance. An explicit (or defaulted) sort order disables scoring.
    pub(crate) fn scored(&self) -> bool {
        !self.terms.is_empty() && self.sort.is_none()
    }

    /// Evaluate a record.
    ///
    /// `None`: no match. `Some(None)`: match without a relevance score
    /// (pure filter match or field-sorted query). `Some(Some(raw))`: match
    /// with a raw score.
    pub(crate) fn evaluate(&self, record: &Value) -> Option<Option<f64>> {
        if !self.clauses.iter().all(|c| c.matches(record)) {
            return None;
        }
        if !self.geo_matches(record) {
            return None;
        }

        if self.terms.is_empty() {
            return Some(None);
        }

        // Boosted, fuzzy, AND-combined text query over all fields (or only
        // the boosted fields when boosts are given).
        let unrestricted = if self.boosts.is_empty() {
            all_tokens(record)
        } else {
            Vec::new()
        };
        let mut total = 0.0;
        for term in &self.terms {
            let best = if self.boosts.is_empty() {
                self.best_match(term, &unrestricted, 1.0)
            } else {
                let mut best: Option<f64> = None;
                for (field, weight) in &self.boosts {
                    let tokens = field_tokens(record, field);
                    if let Some(score) = self.best_match(term, &tokens, *weight) {
                        best = Some(best.map_or(score, |b: f64| b.max(score)));
                    }
                }
                best
            };
            match best {
                Some(score) => total += score,
                None => return None,
            }
        }

        if !self.scored() {
            return Some(None);
        }

        // Popularity bias: multiply relevance by the record's link count.
        let link_count = scalars_at(record, LINK_COUNT_FIELD)
            .first()
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);
        Some(Some(total * link_count))
    }

    fn best_match(&self, term: &str, tokens: &[String], weight: f64) -> Option<f64> {
        tokens
            .iter()
            .filter_map(|token| text::term_match(term, token, self.fuzziness))
            .fold(None, |best: Option<f64>, quality| {
                let score = quality * weight;
                Some(best.map_or(score, |b| b.max(score)))
            })
    }

    fn geo_matches(&self, record: &Value) -> bool {
        if self.geo_box.is_none() && self.polygon.is_empty() {
            return true;
        }
        let points = geo_points(record);
        if let Some((tl, br)) = self.geo_box {
            if !points.iter().any(|p| in_bounding_box(p, tl, br)) {
                return false;
            }
        }
        if !self.polygon.is_empty() && !points.iter().any(|p| in_polygon(p, &self.polygon)) {
            return false;
        }
        true
    }

    /// Order two evaluated hits: by the sort field when one is set,
    /// otherwise by raw score descending. Ties break on document key.
    pub(crate) fn order(
        &self,
        a: &(String, Value, Option<f64>),
        b: &(String, Value, Option<f64>),
    ) -> Ordering {
        let ordering = match &self.sort {
            Some(sort) => {
                let va = scalars_at(&a.1, &sort.field).first().cloned().cloned();
                let vb = scalars_at(&b.1, &sort.field).first().cloned().cloned();
                let cmp = compare_values(va.as_ref(), vb.as_ref());
                if sort.ascending { cmp } else { cmp.reverse() }
            }
            None => b
                .2
                .partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal),
        };
        ordering.then_with(|| a.0.cmp(&b.0))
    }
}

/// Compare two scalar field values: numbers numerically, otherwise as
/// strings. Missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => scalar_text(a).cmp(&scalar_text(b)),
        },
    }
}

// ---------------------------------------------------------------------------
// Field resolution
// ---------------------------------------------------------------------------

/// Collect the values at a dotted path, traversing arrays transparently.
fn values_at_path<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(v) = item.get(segment) {
                            next.push(v);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Resolve a field path: top level first, then under the `resource` slot.
pub(crate) fn resolve_path<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let direct = values_at_path(root, path);
    if !direct.is_empty() || path.starts_with("resource.") {
        return direct;
    }
    values_at_path(root, &format!("resource.{path}"))
}

/// Scalar leaves at a path: arrays are flattened, language maps and other
/// objects contribute their leaf values.
fn scalars_at<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut scalars = Vec::new();
    for value in resolve_path(root, path) {
        collect_scalars(value, &mut scalars);
    }
    scalars
}

fn collect_scalars<'a>(value: &'a Value, into: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_scalars(item, into);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_scalars(item, into);
            }
        }
        Value::Null => {}
        _ => into.push(value),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn scalar_eq(value: &Value, filter: &str) -> bool {
    match value {
        Value::String(s) => s == filter,
        Value::Number(n) => filter.parse::<f64>().is_ok_and(|f| {
            n.as_f64().is_some_and(|v| v == f)
        }),
        Value::Bool(b) => filter.parse::<bool>().is_ok_and(|f| *b == f),
        _ => false,
    }
}

fn scalar_gte(value: &Value, filter: &str) -> bool {
    if let (Some(v), Ok(f)) = (value.as_f64(), filter.parse::<f64>()) {
        return v >= f;
    }
    scalar_text(value).as_str() >= filter
}

/// All string-leaf tokens of a record, for unrestricted text matching.
fn all_tokens(record: &Value) -> Vec<String> {
    let mut scalars = Vec::new();
    collect_scalars(record, &mut scalars);
    scalars
        .iter()
        .filter_map(|v| v.as_str())
        .flat_map(text::tokenize)
        .collect()
}

/// Tokens at one field path.
fn field_tokens(record: &Value, field: &str) -> Vec<String> {
    scalars_at(record, field)
        .iter()
        .filter_map(|v| v.as_str())
        .flat_map(text::tokenize)
        .collect()
}

// ---------------------------------------------------------------------------
// Geo
// ---------------------------------------------------------------------------

/// Extract `{lat, lon}` points at the geo field.
fn geo_points(record: &Value) -> Vec<GeoPoint> {
    resolve_path(record, GEO_FIELD)
        .iter()
        .filter_map(|v| {
            let lat = v.get("lat")?.as_f64()?;
            let lon = v.get("lon")?.as_f64()?;
            Some(GeoPoint::new(lat, lon))
        })
        .collect()
}

fn in_bounding_box(p: &GeoPoint, top_left: GeoPoint, bottom_right: GeoPoint) -> bool {
    p.lat <= top_left.lat
        && p.lat >= bottom_right.lat
        && p.lon >= top_left.lon
        && p.lon <= bottom_right.lon
}

/// Ray-casting point-in-polygon test over (lon, lat) coordinates.
fn in_polygon(p: &GeoPoint, polygon: &[GeoPoint]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let intersect_lon = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if p.lon < intersect_lon {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Apply a projection: keep only the listed field paths.
pub(crate) fn apply_projection(record: &Value, fetch_source: &[String]) -> Value {
    if fetch_source.is_empty() {
        return record.clone();
    }
    let mut projected = Map::new();
    for path in fetch_source {
        // Resolve with the `resource` fallback, but write under the path
        // the caller asked for.
        let values = resolve_path(record, path);
        if values.is_empty() {
            continue;
        }
        let value = if values.len() == 1 {
            values[0].clone()
        } else {
            Value::Array(values.into_iter().cloned().collect())
        };
        insert_at_path(&mut projected, path, value);
    }
    Value::Object(projected)
}

fn insert_at_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = map;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(next) => current = next,
            _ => return,
        }
    }
}
