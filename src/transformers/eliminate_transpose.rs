//! Redundant Transpose pair elimination

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::GraphResult;
use crate::graph::{Graph, OpId, RemovalPlan};

use super::common::{GraphTransformer, TransformResult};

/// Remove `Transpose -> Transpose` pairs whose permutations cancel
///
/// Consumers of the downstream output are rewired to the upstream input.
/// The downstream Transpose and its output are marked for removal; the
/// upstream output is queued so cleanup can drop the upstream Transpose once
/// nothing reads it. Pairs are matched once per run: in a chain of three
/// cancelling Transposes only the first two collapse.
#[derive(Debug, Default)]
pub struct EliminateTransposePair;

impl EliminateTransposePair {
    /// Create the pass
    pub fn new() -> Self {
        Self
    }

    fn find_pairs(graph: &Graph, plan: &RemovalPlan) -> Vec<(OpId, OpId)> {
        let mut claimed: FxHashSet<OpId> = FxHashSet::default();
        let mut pairs = Vec::new();

        for down in graph.operators() {
            let Some(down_attrs) = down.as_transpose() else {
                continue;
            };
            if down.predecessors().len() != 1 {
                continue;
            }
            let up_id = down.predecessors()[0];
            let Some(up) = graph.operator(up_id) else {
                continue;
            };
            let Some(up_attrs) = up.as_transpose() else {
                continue;
            };
            if !down_attrs.cancels(up_attrs) {
                continue;
            }

            // Nothing reads the downstream output: it is a graph output.
            let consumed = down
                .outputs()
                .iter()
                .filter_map(|t| graph.tensor(*t))
                .any(|t| !t.targets().is_empty());
            if !consumed {
                continue;
            }

            let down_id = down.guid();
            if claimed.contains(&up_id) || claimed.contains(&down_id) {
                continue;
            }
            if plan.removes_operator(up_id) || plan.removes_operator(down_id) {
                continue;
            }
            claimed.insert(up_id);
            claimed.insert(down_id);
            pairs.push((up_id, down_id));
        }
        pairs
    }

    fn collapse(
        graph: &mut Graph,
        plan: &mut RemovalPlan,
        up: OpId,
        down: OpId,
    ) -> GraphResult<bool> {
        // Read at apply time: an earlier pair may have rewired `up`.
        let Some(&source) = graph.inputs_of(up).first() else {
            return Ok(false);
        };
        let Some(&output) = graph
            .operator(down)
            .and_then(|op| op.outputs().first())
        else {
            return Ok(false);
        };

        let consumers: Vec<OpId> = graph
            .tensor(output)
            .map(|t| t.targets().to_vec())
            .unwrap_or_default();
        for consumer in consumers {
            graph.replace_input(consumer, output, source)?;
        }

        for orphan in graph.detach_operator(down)? {
            plan.queue_orphan(orphan);
        }
        plan.remove_operator(down);
        plan.remove_tensor(output);

        debug!(upstream = %up, downstream = %down, "eliminated transpose pair");
        Ok(true)
    }
}

impl GraphTransformer for EliminateTransposePair {
    fn name(&self) -> &'static str {
        "EliminateTransposePair"
    }

    fn transform(&self, graph: &mut Graph, plan: &mut RemovalPlan) -> GraphResult<TransformResult> {
        let mut result = TransformResult::new();
        graph.ensure_sorted()?;

        let pairs = Self::find_pairs(graph, plan);
        result.patterns_matched = pairs.len();

        for (up, down) in pairs {
            if Self::collapse(graph, plan, up, down)? {
                result.record_elimination(down);
            }
        }
        Ok(result)
    }

    fn is_applicable(&self, graph: &Graph) -> bool {
        graph
            .operators()
            .filter(|op| op.as_transpose().is_some())
            .nth(1)
            .is_some()
    }
}
