//! Rich diagnostic error types for the seshat store.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for seshat.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SeshatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(seshat::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(seshat::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption — try running with a fresh data directory. \
             If the problem persists, file a bug report."
        )
    )]
    Redb { message: String },

    #[error("durability sync failed: {message}")]
    #[diagnostic(
        code(seshat::store::sync),
        help(
            "A write was rolled back because it could not be made durable. \
             The in-memory graph and the commit log were left untouched; \
             retry the write once the underlying problem is fixed."
        )
    )]
    Sync { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(seshat::store::serde),
        help(
            "Failed to serialize or deserialize stored data. \
             This usually means the stored data format has changed between versions. \
             Try re-ingesting your data."
        )
    )]
    Serialization { message: String },

    #[error("lock poisoned: a writer panicked while holding the graph lock")]
    #[diagnostic(
        code(seshat::store::poisoned),
        help(
            "A previous write panicked mid-flight and the canonical graph may be \
             inconsistent. Restart the process; the store will be rebuilt from \
             the durable triple table."
        )
    )]
    Poisoned,
}

// ---------------------------------------------------------------------------
// History errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum HistoryError {
    #[error("failed to append commit to history: {message}")]
    #[diagnostic(
        code(seshat::history::append),
        help(
            "The commit was applied to the graph but could not be recorded in the \
             commit log. History for the touched resources is now incomplete."
        )
    )]
    Append { message: String },

    #[error("failed to read commit log: {message}")]
    #[diagnostic(
        code(seshat::history::read),
        help("The persisted commit log could not be decoded. It may be from an incompatible version.")
    )]
    Read { message: String },
}

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("failed to read ontology file {path}: {source}")]
    #[diagnostic(
        code(seshat::infer::ontology_io),
        help("Check that the inverse-relation ontology file exists and is readable.")
    )]
    OntologyIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ontology file {path}: {message}")]
    #[diagnostic(
        code(seshat::infer::ontology_parse),
        help(
            "The ontology file must be TOML with a `pairs` array of two-element \
             arrays, e.g. pairs = [[\"http://schema.org/member\", \"http://schema.org/memberOf\"]]."
        )
    )]
    OntologyParse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Search index errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("failed to encode document for {id}: {message}")]
    #[diagnostic(
        code(seshat::index::encode),
        help("The resource could not be framed as a search document. The graph copy is unaffected.")
    )]
    Encode { id: String, message: String },

    #[error("bulk indexing failed for {failed} of {total} documents")]
    #[diagnostic(
        code(seshat::index::bulk),
        help(
            "Some documents in the batch could not be written. The search index \
             is best-effort; the graph store remains the source of truth."
        )
    )]
    Bulk { failed: usize, total: usize },

    #[error("scroll cursor {cursor} expired or unknown")]
    #[diagnostic(
        code(seshat::index::scroll_expired),
        help(
            "Scroll cursors are kept alive for a fixed time-to-live per fetch. \
             A consumer that stalls longer than the TTL must restart its query."
        )
    )]
    ScrollExpired { cursor: u64 },
}

// ---------------------------------------------------------------------------
// Repository errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RepoError {
    #[error("missing metadata field: {field}")]
    #[diagnostic(
        code(seshat::repo::metadata),
        help("Every write must carry `author` and an ISO-8601 `date` in its metadata map.")
    )]
    MissingMetadata { field: String },

    #[error("invalid timestamp {value}: {message}")]
    #[diagnostic(
        code(seshat::repo::timestamp),
        help("Timestamps must be ISO-8601 / RFC 3339, e.g. 2024-05-01T12:00:00Z.")
    )]
    InvalidTimestamp { value: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    History(#[from] HistoryError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    #[diagnostic(
        code(seshat::config::io),
        help("Check that the config file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {message}")]
    #[diagnostic(
        code(seshat::config::parse),
        help("The config file must be valid TOML. {message}")
    )]
    Parse { path: String, message: String },
}

/// Convenience alias for functions returning seshat results.
pub type SeshatResult<T> = std::result::Result<T, SeshatError>;
