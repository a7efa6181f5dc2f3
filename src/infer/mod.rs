//! Relation inference.
//!
//! The only rule family currently implemented is `owl:inverseOf`: a small
//! ontology of predicate pairs, loaded once at startup and closed under
//! symmetry, from which inverse triples are constructed. Inference is a
//! pure enrichment pass: it computes triples to add and never removes any.

pub mod inverse;

pub use inverse::InverseOntology;
