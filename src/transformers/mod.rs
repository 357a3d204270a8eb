//! Graph rewrite passes
//!
//! This module provides the rewrite passes run by [`Graph::optimize`]:
//!
//! - **Elimination**: drop `Transpose -> Transpose` pairs that cancel
//! - **Fusion**: fold a last-two-axes Transpose into MatMul's `trans_a`/`trans_b`
//! - **Cleanup**: remove producers nothing reads any more
//!
//! # Overview
//!
//! Each pass implements the [`GraphTransformer`] trait and records deletions
//! in a [`RemovalPlan`] instead of removing anything itself.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tensor_planner::prelude::*;
//! use tensor_planner::transformers::{EliminateTransposePair, GraphTransformer};
//!
//! let mut graph = Graph::new(Rc::new(NativeRuntime::new()));
//! let mut plan = RemovalPlan::new();
//!
//! let result = EliminateTransposePair::new().transform(&mut graph, &mut plan)?;
//! assert!(result.is_noop());
//! # Ok::<(), GraphError>(())
//! ```
//!
//! # Using OptimizationPipeline
//!
//! [`OptimizationPipeline`] runs the enabled passes in their fixed order and
//! finishes with cleanup:
//!
//! ```ignore
//! let pipeline = OptimizationPipeline::eliminate_only();
//! let stats = pipeline.run(&mut graph, &mut plan)?;
//! ```

/// Dead producer cleanup
pub mod cleanup;
/// Common types
pub mod common;
/// Transpose pair elimination
pub mod eliminate_transpose;
/// Transpose into MatMul fusion
pub mod fuse_transpose_matmul;

pub use cleanup::SweepDeadProducers;
pub use common::{run_transformers, GraphTransformer, TransformResult};
pub use eliminate_transpose::EliminateTransposePair;
pub use fuse_transpose_matmul::FuseTransposeMatMul;

use std::fmt;

use tracing::debug;

use crate::config::PassConfig;
use crate::error::GraphResult;
use crate::graph::{Graph, RemovalPlan};

/// Per-pass counters of one optimization run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizeStats {
    /// Transpose pair elimination
    pub eliminate_transpose: TransformResult,
    /// Transpose into MatMul fusion
    pub fuse_transpose_matmul: TransformResult,
    /// Dead producer cleanup
    pub cleanup: TransformResult,
    /// Operators deleted from the graph
    pub operators_removed: usize,
    /// Tensors deleted from the graph
    pub tensors_removed: usize,
}

impl OptimizeStats {
    /// All pass results merged into one
    pub fn total(&self) -> TransformResult {
        let mut total = TransformResult::new();
        total.merge(self.eliminate_transpose.clone());
        total.merge(self.fuse_transpose_matmul.clone());
        total.merge(self.cleanup.clone());
        total
    }

    /// Whether the run left the graph unchanged
    pub fn is_noop(&self) -> bool {
        self.operators_removed == 0 && self.tensors_removed == 0 && self.total().is_noop()
    }
}

impl fmt::Display for OptimizeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "eliminated {} transpose pairs, fused {} transposes, removed {} operators and {} tensors",
            self.eliminate_transpose.nodes_eliminated,
            self.fuse_transpose_matmul.transforms_applied,
            self.operators_removed,
            self.tensors_removed
        )
    }
}

/// Optimization pipeline that runs the rewrite passes in sequence
///
/// Elimination always runs before fusion so that a cancelled pair is never
/// half-fused into a MatMul.
#[derive(Debug, Clone, Copy)]
pub struct OptimizationPipeline {
    /// Enable transpose pair elimination
    pub eliminate: bool,
    /// Enable transpose into MatMul fusion
    pub fuse: bool,
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self {
            eliminate: true,
            fuse: true,
        }
    }
}

impl From<&PassConfig> for OptimizationPipeline {
    fn from(config: &PassConfig) -> Self {
        Self {
            eliminate: config.eliminate_transpose,
            fuse: config.fuse_transpose_matmul,
        }
    }
}

impl OptimizationPipeline {
    /// Create a new pipeline with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable only elimination
    pub fn eliminate_only() -> Self {
        Self {
            eliminate: true,
            fuse: false,
        }
    }

    /// Enable only fusion
    pub fn fuse_only() -> Self {
        Self {
            eliminate: false,
            fuse: true,
        }
    }

    /// Run the enabled passes and cleanup, collecting deletions in `plan`
    ///
    /// The graph keeps every marked operator and tensor until the caller
    /// applies the plan.
    pub fn run(&self, graph: &mut Graph, plan: &mut RemovalPlan) -> GraphResult<OptimizeStats> {
        let mut stats = OptimizeStats::default();

        if self.eliminate {
            stats.eliminate_transpose = Self::run_pass(&EliminateTransposePair::new(), graph, plan)?;
        }
        if self.fuse {
            stats.fuse_transpose_matmul = Self::run_pass(&FuseTransposeMatMul::new(), graph, plan)?;
        }
        stats.cleanup = Self::run_pass(&SweepDeadProducers::new(), graph, plan)?;

        Ok(stats)
    }

    fn run_pass(
        pass: &dyn GraphTransformer,
        graph: &mut Graph,
        plan: &mut RemovalPlan,
    ) -> GraphResult<TransformResult> {
        if !pass.is_applicable(graph) {
            return Ok(TransformResult::new());
        }
        let result = pass.transform(graph, plan)?;
        debug!(
            pass = pass.name(),
            matched = result.patterns_matched,
            applied = result.transforms_applied,
            eliminated = result.nodes_eliminated,
            "pass finished"
        );
        Ok(result)
    }
}
