//! RDF triple data model.
//!
//! The graph stores triples (subject, predicate, object) compared by value.
//!
//! - [`Node`] is an object position value: an IRI or a literal
//! - [`Triple`] is a single statement
//! - [`Model`] ([`model`]) is an indexed *set* of triples with bounded-description
//!   retrieval
//!
//! Subjects and predicates are always IRIs, so they are plain strings here;
//! only the object position carries the IRI/literal distinction.

pub mod model;

use serde::{Deserialize, Serialize};

pub use model::Model;

/// An RDF object position: an IRI reference or a literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// An IRI reference to another resource.
    Iri { iri: String },
    /// A literal value with an optional language tag.
    Literal {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
}

impl Node {
    /// Create an IRI node.
    pub fn iri(iri: impl Into<String>) -> Self {
        Node::Iri { iri: iri.into() }
    }

    /// Create a plain literal node.
    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal {
            value: value.into(),
            lang: None,
        }
    }

    /// Create a language-tagged literal node.
    pub fn literal_lang(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Node::Literal {
            value: value.into(),
            lang: Some(lang.into()),
        }
    }

    /// The IRI if this node is an IRI reference.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Node::Iri { iri } => Some(iri),
            Node::Literal { .. } => None,
        }
    }

    /// Whether this node is an IRI reference.
    pub fn is_iri(&self) -> bool {
        matches!(self, Node::Iri { .. })
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Iri { iri } => write!(f, "<{iri}>"),
            Node::Literal { value, lang: Some(lang) } => write!(f, "\"{value}\"@{lang}"),
            Node::Literal { value, lang: None } => write!(f, "\"{value}\""),
        }
    }
}

/// A single (subject, predicate, object) statement.
///
/// Triples are compared by value; a [`Model`] holds at most one copy of
/// any given triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// Subject IRI.
    pub subject: String,
    /// Predicate IRI.
    pub predicate: String,
    /// Object node (IRI or literal).
    pub object: Node,
}

impl Triple {
    /// Create a new triple.
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Node) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }

    /// Shorthand for a triple whose object is an IRI.
    pub fn link(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self::new(subject, predicate, Node::iri(object))
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// The `rdf:type` predicate IRI.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triples_compare_by_value() {
        let a = Triple::link("http://ex/1", "http://ex/p", "http://ex/2");
        let b = Triple::link("http://ex/1", "http://ex/p", "http://ex/2");
        assert_eq!(a, b);

        let c = Triple::new("http://ex/1", "http://ex/p", Node::literal("http://ex/2"));
        assert_ne!(a, c); // IRI object and literal object are distinct
    }

    #[test]
    fn display_forms() {
        let t = Triple::new(
            "http://ex/1",
            "http://ex/name",
            Node::literal_lang("Karte", "de"),
        );
        assert_eq!(t.to_string(), "<http://ex/1> <http://ex/name> \"Karte\"@de .");
    }

    #[test]
    fn node_serde_roundtrip() {
        let n = Node::literal_lang("hello", "en");
        let json = serde_json::to_string(&n).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(n, back);

        let i = Node::iri("http://ex/1");
        let json = serde_json::to_string(&i).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(i, back);
    }
}
