//! Commits and diffs: the unit of change for the graph store.
//!
//! A [`Diff`] is an ordered list of add/remove lines computed once against a
//! store snapshot. Applying a diff uses set semantics: adding a triple that
//! is already present, or removing one that is absent, is a no-op. Diffs
//! compose by concatenation ([`Diff::append`]).
//!
//! A [`Commit`] pairs a diff with a provenance header and is immutable once
//! created; the persisted shape is `{author, timestamp, added, removed}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{Model, Triple};

/// Whether a diff line adds or removes its triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Add,
    Remove,
}

/// One line of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub op: Op,
    pub triple: Triple,
}

/// An ordered add/remove changeset between two graph states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    lines: Vec<DiffLine>,
}

impl Diff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a triple to add.
    pub fn add(&mut self, triple: Triple) {
        self.lines.push(DiffLine { op: Op::Add, triple });
    }

    /// Record a triple to remove.
    pub fn remove(&mut self, triple: Triple) {
        self.lines.push(DiffLine { op: Op::Remove, triple });
    }

    /// Concatenate another diff onto this one, preserving order.
    pub fn append(&mut self, other: Diff) {
        self.lines.extend(other.lines);
    }

    /// Whether the diff has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// The lines in recorded order.
    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    /// Triples added by this diff.
    pub fn added(&self) -> impl Iterator<Item = &Triple> {
        self.lines
            .iter()
            .filter(|l| l.op == Op::Add)
            .map(|l| &l.triple)
    }

    /// Triples removed by this diff.
    pub fn removed(&self) -> impl Iterator<Item = &Triple> {
        self.lines
            .iter()
            .filter(|l| l.op == Op::Remove)
            .map(|l| &l.triple)
    }

    /// Every IRI mentioned by this diff's triples (subject or object) that
    /// lies within the managed namespace. Sorted and deduplicated.
    pub fn touched_ids(&self, namespace: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for line in &self.lines {
            if line.triple.subject.starts_with(namespace) {
                ids.push(line.triple.subject.clone());
            }
            if let Some(iri) = line.triple.object.as_iri() {
                if iri.starts_with(namespace) {
                    ids.push(iri.to_string());
                }
            }
        }
        ids.sort();
        ids.dedup();
        ids
    }

    /// Apply the diff to a model in line order.
    ///
    /// Set semantics make this idempotent: re-adding a present triple and
    /// removing an absent one are both no-ops.
    pub fn apply(&self, model: &mut Model) {
        for line in &self.lines {
            match line.op {
                Op::Add => {
                    model.insert(line.triple.clone());
                }
                Op::Remove => {
                    model.remove(&line.triple);
                }
            }
        }
    }
}

/// Provenance header attached to every commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHeader {
    /// Author identifier (typically a profile IRI or email).
    pub author: String,
    /// When the commit was created.
    pub timestamp: DateTime<Utc>,
}

impl CommitHeader {
    pub fn new(author: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            timestamp,
        }
    }
}

/// A diff plus provenance header: the atomic unit of store history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CommitRepr", into = "CommitRepr")]
pub struct Commit {
    pub header: CommitHeader,
    pub diff: Diff,
}

impl Commit {
    pub fn new(header: CommitHeader, diff: Diff) -> Self {
        Self { header, diff }
    }
}

/// Persisted commit shape: `{author, timestamp, added: [...], removed: [...]}`.
#[derive(Serialize, Deserialize)]
struct CommitRepr {
    author: String,
    timestamp: DateTime<Utc>,
    added: Vec<Triple>,
    removed: Vec<Triple>,
}

impl From<Commit> for CommitRepr {
    fn from(commit: Commit) -> Self {
        Self {
            author: commit.header.author,
            timestamp: commit.header.timestamp,
            added: commit.diff.added().cloned().collect(),
            removed: commit.diff.removed().cloned().collect(),
        }
    }
}

impl From<CommitRepr> for Commit {
    fn from(repr: CommitRepr) -> Self {
        let mut diff = Diff::new();
        for triple in repr.added {
            diff.add(triple);
        }
        for triple in repr.removed {
            diff.remove(triple);
        }
        Self {
            header: CommitHeader::new(repr.author, repr.timestamp),
            diff,
        }
    }
}
