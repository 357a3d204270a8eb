//! Structural invariant checks
//!
//! - a tensor's source and targets must be operators of the graph
//! - a tensor with neither source nor targets must not exist
//! - operator inputs and outputs must be tensors of the graph
//! - predecessors and successors must be operators of the graph and match
//!   the tensor links
//! - no two tensors share a FUID

use rustc_hash::FxHashSet;

use crate::error::{GraphError, GraphResult};

use super::context::Graph;
use super::maps::OpId;

fn invalid(msg: String) -> GraphError {
    GraphError::InvalidGraphState(msg)
}

fn same_set(a: &[OpId], b: &[OpId]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

impl Graph {
    /// Verify every structural invariant, reporting the first violation
    pub fn check_valid(&self) -> GraphResult<()> {
        for tensor in self.tensors.values() {
            let id = tensor.guid();
            if tensor.is_disconnected() {
                return Err(invalid(format!(
                    "tensor {} has neither source nor targets",
                    id
                )));
            }
            for target in tensor.targets() {
                let op = self.ops.get(target).ok_or_else(|| {
                    invalid(format!("tensor {} targets missing operator {}", id, target))
                })?;
                if !op.inputs().contains(&id) {
                    return Err(invalid(format!(
                        "tensor {} targets operator {} which does not read it",
                        id, target
                    )));
                }
            }
            if let Some(source) = tensor.source() {
                let op = self.ops.get(&source).ok_or_else(|| {
                    invalid(format!("tensor {} has missing source {}", id, source))
                })?;
                if !op.outputs().contains(&id) {
                    return Err(invalid(format!(
                        "tensor {} names operator {} as source but is not its output",
                        id, source
                    )));
                }
            }
        }

        for op in self.ops.values() {
            let id = op.guid();
            for input in op.inputs() {
                let tensor = self.tensors.get(input).ok_or_else(|| {
                    invalid(format!("operator {} reads missing tensor {}", id, input))
                })?;
                if !tensor.targets().contains(&id) {
                    return Err(invalid(format!(
                        "operator {} reads tensor {} without being its target",
                        id, input
                    )));
                }
            }
            for output in op.outputs() {
                let tensor = self.tensors.get(output).ok_or_else(|| {
                    invalid(format!("operator {} writes missing tensor {}", id, output))
                })?;
                if tensor.source() != Some(id) {
                    return Err(invalid(format!(
                        "operator {} writes tensor {} produced by {:?}",
                        id,
                        output,
                        tensor.source()
                    )));
                }
            }
            for pred in op.predecessors() {
                if !self.ops.contains_key(pred) {
                    return Err(invalid(format!(
                        "operator {} has missing predecessor {}",
                        id, pred
                    )));
                }
            }
            for succ in op.successors() {
                if !self.ops.contains_key(succ) {
                    return Err(invalid(format!(
                        "operator {} has missing successor {}",
                        id, succ
                    )));
                }
            }
            if let Some((preds, succs)) = self.derive_adjacency(id) {
                if !same_set(&preds, op.predecessors()) || !same_set(&succs, op.successors()) {
                    return Err(invalid(format!(
                        "operator {} adjacency cache disagrees with tensor links",
                        id
                    )));
                }
            }
        }

        let mut fuids = FxHashSet::default();
        for tensor in self.tensors.values() {
            if !fuids.insert(tensor.fuid()) {
                return Err(invalid(format!("duplicate FUID {}", tensor.fuid())));
            }
        }
        Ok(())
    }
}
