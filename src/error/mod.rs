//! Error types for tensor-planner
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for graph construction, rewriting and memory planning
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An adjacency or ownership invariant is violated
    #[error("Invalid graph state: {0}")]
    InvalidGraphState(String),

    /// A tensor created on one runtime was added to a graph on another
    #[error("Tensor runtime mismatch: cannot add a tensor in {found} to {expected}")]
    RuntimeMismatch {
        /// Runtime of the graph
        expected: String,
        /// Runtime of the tensor
        found: String,
    },

    /// Topological sort could not make progress
    #[error("Graph contains a cycle")]
    CyclicGraph,

    /// Incompatible shapes for an operator
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Allocator used outside of its planning phase
    #[error("Allocator misuse: {0}")]
    AllocatorMisuse(String),

    /// Operator kind not handled where kind-specific logic is required
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Operator attributes or arity are malformed
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),
}

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
