//! Transpose-into-MatMul fusion

use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::graph::{Graph, OpId, RemovalPlan, TensorId};
use crate::operator::OpKind;

use super::common::{GraphTransformer, TransformResult};

/// A MatMul input fed by a last-two-axes Transpose
#[derive(Debug, Clone, Copy)]
struct FusionSite {
    matmul: OpId,
    index: usize,
    transpose: OpId,
    /// Tensor read by the Transpose
    source: TensorId,
    /// Tensor written by the Transpose
    through: TensorId,
}

/// Fold `Transpose(swap last two axes) -> MatMul` into the MatMul flags
///
/// The MatMul reads the Transpose input directly and the matching
/// `trans_a`/`trans_b` flag is flipped. The Transpose output is queued for
/// cleanup; the Transpose itself goes away once nothing reads it.
#[derive(Debug, Default)]
pub struct FuseTransposeMatMul;

impl FuseTransposeMatMul {
    /// Create the pass
    pub fn new() -> Self {
        Self
    }

    fn find_sites(graph: &Graph, plan: &RemovalPlan) -> Vec<FusionSite> {
        let mut sites = Vec::new();
        for matmul in graph.operators().filter(|op| op.as_matmul().is_some()) {
            if plan.removes_operator(matmul.guid()) {
                continue;
            }
            for (index, &input) in matmul.inputs().iter().enumerate() {
                let Some(transpose) = graph.producer(input) else {
                    continue;
                };
                if plan.removes_operator(transpose.guid()) {
                    continue;
                }
                let swaps = transpose
                    .as_transpose()
                    .is_some_and(|attrs| attrs.swaps_last_two_axes());
                if !swaps {
                    continue;
                }
                let Some(&source) = transpose.inputs().first() else {
                    continue;
                };
                sites.push(FusionSite {
                    matmul: matmul.guid(),
                    index,
                    transpose: transpose.guid(),
                    source,
                    through: input,
                });
            }
        }
        sites
    }

    fn fold(graph: &mut Graph, plan: &mut RemovalPlan, site: FusionSite) -> GraphResult<()> {
        let kind = graph.ops.get_mut(&site.matmul).map(|op| op.kind_mut());
        match kind {
            Some(OpKind::MatMul(attrs)) => {
                if site.index == 0 {
                    attrs.trans_a ^= true;
                } else {
                    attrs.trans_b ^= true;
                }
            }
            Some(other) => {
                return Err(GraphError::UnsupportedOperator(format!(
                    "cannot fold a transpose into {} operator {}",
                    other.op_type(),
                    site.matmul
                )));
            }
            None => {
                return Err(GraphError::InvalidGraphState(format!(
                    "operator {} is not in the graph",
                    site.matmul
                )));
            }
        }
        graph.replace_input_at(site.matmul, site.index, site.source)?;
        plan.queue_orphan(site.through);

        debug!(
            matmul = %site.matmul,
            transpose = %site.transpose,
            input = site.index,
            "fused transpose into matmul"
        );
        Ok(())
    }
}

impl GraphTransformer for FuseTransposeMatMul {
    fn name(&self) -> &'static str {
        "FuseTransposeMatMul"
    }

    fn transform(&self, graph: &mut Graph, plan: &mut RemovalPlan) -> GraphResult<TransformResult> {
        let mut result = TransformResult::new();
        graph.ensure_sorted()?;

        let sites = Self::find_sites(graph, plan);
        result.patterns_matched = sites.len();

        for site in sites {
            Self::fold(graph, plan, site)?;
            result.record(site.matmul);
        }
        Ok(result)
    }

    fn is_applicable(&self, graph: &Graph) -> bool {
        graph.operators().any(|op| op.as_matmul().is_some())
            && graph.operators().any(|op| op.as_transpose().is_some())
    }
}
