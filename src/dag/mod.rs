// src/dag/mod.rs

//! Dependency-graph validation for task admission.
//!
//! Edges are id references stored as data, resolved by lookup; no cyclic
//! in-memory structure exists. [`graph`] holds the pure cycle check,
//! [`admission`] the full validate-and-persist path.

pub mod admission;
pub mod graph;

pub use admission::admit;
pub use graph::would_create_cycle;
