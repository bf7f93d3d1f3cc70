//! Source dependency graph

mod dependency;

pub use dependency::{DependencyGraph, GraphError, GraphResult};
