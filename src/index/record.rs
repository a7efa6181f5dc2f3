//! Stored records: the document shape the search index keeps per resource.
//!
//! A record has two logical slots: the framed `resource` payload, and
//! sibling metadata fields merged at the top level (author, dates, link
//! count). Document keys are derived from the resource id: a syntactically
//! valid absolute URI is percent-encoded, anything else (opaque UUIDs) is
//! used verbatim, so both kinds share one index.

use serde_json::{Map, Value};
use url::Url;

use crate::repo::{Metadata, metadata};
use crate::resource::Resource;

/// The record field holding the framed resource payload.
pub(crate) const RESOURCE_KEY: &str = "resource";

/// The record field holding the outbound-link count used for ranking.
pub(crate) const LINK_COUNT_KEY: &str = "linkCount";

pub(crate) const DATE_CREATED_KEY: &str = "dateCreated";
pub(crate) const DATE_MODIFIED_KEY: &str = "dateModified";

/// A resource snapshot together with its framed record.
#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub resource: Resource,
    pub record: Value,
}

/// Derive the document key for a resource id.
pub(crate) fn document_key(id: &str) -> String {
    if Url::parse(id).is_ok() {
        urlencoding::encode(id).into_owned()
    } else {
        id.to_string()
    }
}

/// Build the record for an upsert, merging metadata fields at the top
/// level. `dateCreated` is preserved from an existing record; the
/// metadata date only moves `dateModified`.
pub(crate) fn build_record(
    resource: &Resource,
    meta: &Metadata,
    existing: Option<&Value>,
) -> Value {
    let mut record = Map::new();
    record.insert(RESOURCE_KEY.to_string(), resource.to_document());
    for (key, value) in meta {
        record.insert(key.clone(), Value::String(value.clone()));
    }
    record.insert(
        LINK_COUNT_KEY.to_string(),
        Value::from(resource.links().len()),
    );

    if let Some(date) = meta.get(metadata::DATE) {
        let created = existing
            .and_then(|r| r.get(DATE_CREATED_KEY))
            .and_then(Value::as_str)
            .unwrap_or(date)
            .to_string();
        record.insert(DATE_CREATED_KEY.to_string(), Value::String(created));
        record.insert(DATE_MODIFIED_KEY.to_string(), Value::String(date.clone()));
    }

    Value::Object(record)
}
