//! Inverse-relation ontology and enrichment.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::InferError;
use crate::graph::{Model, Triple};

/// Result type for inference operations.
pub type InferResult<T> = std::result::Result<T, InferError>;

/// A set of predicate pairs `(p, q)` meaning `p owl:inverseOf q`.
///
/// The pair set is closed under symmetry at construction: declaring
/// `(p, q)` makes `(q, p)` derivable without a second declaration.
/// Immutable after load; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct InverseOntology {
    inverses: HashMap<String, HashSet<String>>,
}

/// On-disk shape: `pairs = [["p", "q"], ...]`.
#[derive(Deserialize)]
struct OntologyFile {
    pairs: Vec<(String, String)>,
}

impl InverseOntology {
    /// Build an ontology from declared pairs, computing the symmetric closure.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut inverses: HashMap<String, HashSet<String>> = HashMap::new();
        for (p, q) in pairs {
            let (p, q) = (p.into(), q.into());
            inverses.entry(p.clone()).or_default().insert(q.clone());
            inverses.entry(q).or_default().insert(p);
        }
        Self { inverses }
    }

    /// Load an ontology from a TOML file.
    pub fn load(path: &Path) -> InferResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| InferError::OntologyIo {
            path: path.display().to_string(),
            source,
        })?;
        let file: OntologyFile =
            toml::from_str(&text).map_err(|e| InferError::OntologyParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(path = %path.display(), pairs = file.pairs.len(), "loaded inverse ontology");
        Ok(Self::from_pairs(file.pairs))
    }

    /// Number of predicates with at least one declared inverse.
    pub fn len(&self) -> usize {
        self.inverses.len()
    }

    /// Whether no pairs are declared.
    pub fn is_empty(&self) -> bool {
        self.inverses.is_empty()
    }

    /// The declared inverses of a predicate.
    pub fn inverses_of(&self, predicate: &str) -> impl Iterator<Item = &str> {
        self.inverses
            .get(predicate)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Construct all inverse triples implied by the model.
    ///
    /// For every `(s, p, o)` with an IRI object where `(p, q)` is declared,
    /// yields `(o, q, s)`. Pure: the model is not modified.
    pub fn inferred(&self, model: &Model) -> Vec<Triple> {
        let mut constructed = Vec::new();
        for triple in model.iter() {
            let Some(object) = triple.object.as_iri() else {
                continue;
            };
            for inverse in self.inverses_of(&triple.predicate) {
                constructed.push(Triple::link(object, inverse, &triple.subject));
            }
        }
        constructed
    }

    /// Add all implied inverse triples to the model.
    ///
    /// Idempotent (set semantics absorb duplicates) and never removes triples.
    pub fn enrich(&self, model: &mut Model) {
        let constructed = self.inferred(model);
        model.extend(constructed);
    }
}
