//! Manuscript analysis artifacts and the content-addressed cache in front
//! of them.
//!
//! Analysis (structural parsing, entity extraction, style fingerprinting) is
//! pure but not free, so results are cached under a hash of their input
//! text. The cache is strictly an optimization: every analysis function is
//! correct with the cache disabled or cleared mid-session, and a stale or
//! evicted entry only costs a recompute.

pub mod cache;
pub mod entity;
pub mod hash;
pub mod style;

pub use cache::{AnalysisCaches, ContentCache};
pub use entity::{
    build_entity_graph, extract_entities, parse_structure, EntityGraph, EntityNode,
    StructuralParse,
};
pub use hash::{hash_content, hash_with_context};
pub use style::{analyze_style, StyleProfile};
