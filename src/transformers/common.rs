//! Common types for rewrite passes
//!
//! Shared result and trait definitions used by every transformer.

use crate::error::GraphResult;
use crate::graph::{Graph, OpId, RemovalPlan};

/// Transformation result for statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// Number of patterns matched
    pub patterns_matched: usize,
    /// Number of transformations applied
    pub transforms_applied: usize,
    /// Number of operators eliminated
    pub nodes_eliminated: usize,
    /// Operators touched, in rewrite order
    pub transformed_nodes: Vec<OpId>,
}

impl TransformResult {
    /// Create empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful transformation
    pub fn record(&mut self, op: OpId) {
        self.transforms_applied += 1;
        self.transformed_nodes.push(op);
    }

    /// Record elimination
    pub fn record_elimination(&mut self, op: OpId) {
        self.nodes_eliminated += 1;
        self.transformed_nodes.push(op);
    }

    /// Merge with another result
    pub fn merge(&mut self, other: TransformResult) {
        self.patterns_matched += other.patterns_matched;
        self.transforms_applied += other.transforms_applied;
        self.nodes_eliminated += other.nodes_eliminated;
        self.transformed_nodes.extend(other.transformed_nodes);
    }

    /// Whether the pass changed anything
    pub fn is_noop(&self) -> bool {
        self.transforms_applied == 0 && self.nodes_eliminated == 0
    }
}

/// Trait for individual rewrite passes
///
/// A pass rewires links in place and records every deletion in `plan`; the
/// caller applies the plan once all passes are done.
pub trait GraphTransformer {
    /// Name of the transformer
    fn name(&self) -> &'static str;

    /// Apply the transformation
    fn transform(&self, graph: &mut Graph, plan: &mut RemovalPlan) -> GraphResult<TransformResult>;

    /// Check if this transformer is applicable to the graph
    fn is_applicable(&self, _graph: &Graph) -> bool {
        true
    }
}

/// Run multiple transformers in sequence
pub fn run_transformers(
    graph: &mut Graph,
    plan: &mut RemovalPlan,
    transformers: &[&dyn GraphTransformer],
) -> GraphResult<TransformResult> {
    let mut total = TransformResult::new();

    for transformer in transformers {
        if transformer.is_applicable(graph) {
            let result = transformer.transform(graph, plan)?;
            total.merge(result);
        }
    }

    Ok(total)
}
