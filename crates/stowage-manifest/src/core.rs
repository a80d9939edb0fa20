//! Pure analysis of the manifest dependency graph.

mod graph;

pub use graph::find_cycle;
