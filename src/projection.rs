//! Derives the references a collection should hold from a resolved concept closure.
//!
//! Every concept contributes its version url and every one of its mappings contributes
//! the mapping url, whatever source the mapping points into. This is deliberately wider
//! than the edge filter used during traversal, which only follows same-source mappings.

use crate::{
    model::{Concept, Reference},
    traversal::ResolvedConcepts,
};
use std::collections::BTreeSet;

/// A set of reference expressions with deterministic (sorted) iteration order.
pub type ReferenceSet = BTreeSet<Reference>;

/// References contributed by a single concept, in concept-then-mapping order.
pub fn concept_references(concept: &Concept) -> impl Iterator<Item = Reference> + '_ {
    std::iter::once(Reference::new(concept.version_url.clone()))
        .chain(concept.mappings.iter().map(|m| Reference::new(m.url.clone())))
}

pub fn project_references(resolved: &ResolvedConcepts) -> ReferenceSet {
    resolved.values().flat_map(concept_references).collect()
}

/// Human-readable lines describing the closure, one per concept and mapping.
pub fn describe(resolved: &ResolvedConcepts) -> Vec<String> {
    let mut lines = Vec::new();
    for concept in resolved.values() {
        lines.push(format!("Concept: {}", concept.display_name));
        for mapping in concept.mappings.iter() {
            lines.push(format!("Mapping: {mapping}"));
        }
    }
    lines
}
