//! Dead producer cleanup

use tracing::debug;

use crate::error::GraphResult;
use crate::graph::{Graph, RemovalPlan};

use super::common::{GraphTransformer, TransformResult};

/// Walk backward from tensors that lost a consumer and drop dead producers
///
/// A producer whose outputs are all unread is marked for removal together
/// with its outputs, and its inputs are queued in turn. A queued tensor with
/// neither source nor targets is marked as well. Nothing is deleted here.
#[derive(Debug, Default)]
pub struct SweepDeadProducers;

impl SweepDeadProducers {
    /// Create the pass
    pub fn new() -> Self {
        Self
    }
}

impl GraphTransformer for SweepDeadProducers {
    fn name(&self) -> &'static str {
        "SweepDeadProducers"
    }

    fn transform(&self, graph: &mut Graph, plan: &mut RemovalPlan) -> GraphResult<TransformResult> {
        let mut result = TransformResult::new();

        while let Some(id) = plan.pop_orphan() {
            if plan.removes_tensor(id) {
                continue;
            }
            let Some(tensor) = graph.tensor(id) else {
                continue;
            };
            if !tensor.targets().is_empty() {
                continue;
            }

            let Some(source) = tensor.source() else {
                plan.remove_tensor(id);
                continue;
            };
            if plan.removes_operator(source) {
                continue;
            }

            let outputs: Vec<_> = graph
                .operator(source)
                .map(|op| op.outputs().to_vec())
                .unwrap_or_default();
            let dead = outputs
                .iter()
                .filter_map(|t| graph.tensor(*t))
                .all(|t| t.targets().is_empty());
            if !dead {
                continue;
            }

            result.patterns_matched += 1;
            for input in graph.detach_operator(source)? {
                plan.queue_orphan(input);
            }
            plan.remove_operator(source);
            for output in outputs {
                plan.remove_tensor(output);
            }
            debug!(op = %source, "removed dead producer");
            result.record_elimination(source);
        }
        Ok(result)
    }
}
