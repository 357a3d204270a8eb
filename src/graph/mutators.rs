//! Graph mutation operations
//!
//! Link rewiring used by the rewrite passes and the deferred removal of
//! operators and tensors. Every helper keeps tensor links and the
//! predecessor/successor caches consistent and clears the sorted flag.

use indexmap::IndexSet;
use tracing::debug;

use crate::error::{GraphError, GraphResult};

use super::context::Graph;
use super::maps::{push_unique, OpId, OpList, TensorId};

/// Deletions collected while rewriting, applied in one step at the end
#[derive(Debug, Default, Clone)]
pub struct RemovalPlan {
    ops: IndexSet<OpId>,
    tensors: IndexSet<TensorId>,
    /// Tensors that lost a consumer and may now be dead
    orphans: Vec<TensorId>,
}

impl RemovalPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an operator for deletion
    pub fn remove_operator(&mut self, op: OpId) {
        self.ops.insert(op);
    }

    /// Mark a tensor for deletion
    pub fn remove_tensor(&mut self, tensor: TensorId) {
        self.tensors.insert(tensor);
    }

    /// Queue a tensor whose consumer was disconnected
    pub fn queue_orphan(&mut self, tensor: TensorId) {
        self.orphans.push(tensor);
    }

    pub(crate) fn pop_orphan(&mut self) -> Option<TensorId> {
        self.orphans.pop()
    }

    /// Whether an operator is marked for deletion
    pub fn removes_operator(&self, op: OpId) -> bool {
        self.ops.contains(&op)
    }

    /// Whether a tensor is marked for deletion
    pub fn removes_tensor(&self, tensor: TensorId) -> bool {
        self.tensors.contains(&tensor)
    }

    /// Operators marked for deletion, in marking order
    pub fn operators(&self) -> impl Iterator<Item = OpId> + '_ {
        self.ops.iter().copied()
    }

    /// Tensors marked for deletion, in marking order
    pub fn tensors(&self) -> impl Iterator<Item = TensorId> + '_ {
        self.tensors.iter().copied()
    }

    /// Nothing marked and nothing queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.tensors.is_empty() && self.orphans.is_empty()
    }
}

impl Graph {
    // ========================================================================
    // Adjacency cache
    // ========================================================================

    /// `op` plus every operator linked to it through a tensor
    pub(crate) fn neighborhood(&self, op: OpId) -> OpList {
        let mut ops = OpList::new();
        ops.push(op);
        if let Some(operator) = self.ops.get(&op) {
            for input in operator.inputs() {
                if let Some(src) = self.tensors.get(input).and_then(|t| t.source()) {
                    push_unique(&mut ops, src);
                }
            }
            for output in operator.outputs() {
                if let Some(tensor) = self.tensors.get(output) {
                    for &target in tensor.targets() {
                        push_unique(&mut ops, target);
                    }
                }
            }
        }
        ops
    }

    /// Predecessors and successors of `op` as implied by tensor links
    pub(crate) fn derive_adjacency(&self, op: OpId) -> Option<(OpList, OpList)> {
        let operator = self.ops.get(&op)?;
        let mut preds = OpList::new();
        let mut succs = OpList::new();
        for input in operator.inputs() {
            if let Some(src) = self.tensors.get(input).and_then(|t| t.source()) {
                push_unique(&mut preds, src);
            }
        }
        for output in operator.outputs() {
            if let Some(tensor) = self.tensors.get(output) {
                for &target in tensor.targets() {
                    push_unique(&mut succs, target);
                }
            }
        }
        Some((preds, succs))
    }

    /// Recompute the cached adjacency of the given operators
    pub(crate) fn refresh_adjacency(&mut self, ops: impl IntoIterator<Item = OpId>) {
        for op in ops {
            if let Some((preds, succs)) = self.derive_adjacency(op) {
                if let Some(operator) = self.ops.get_mut(&op) {
                    operator.set_adjacency(preds, succs);
                }
            }
        }
    }

    // ========================================================================
    // Link rewiring
    // ========================================================================

    /// Make `op` read `new` wherever it currently reads `old`
    pub(crate) fn replace_input(
        &mut self,
        op: OpId,
        old: TensorId,
        new: TensorId,
    ) -> GraphResult<()> {
        self.require_operator(op)?;
        let old_source = self.require_tensor(old)?.source();
        let new_source = self.require_tensor(new)?.source();

        if let Some(operator) = self.ops.get_mut(&op) {
            for input in operator.inputs_mut().iter_mut() {
                if *input == old {
                    *input = new;
                }
            }
        }
        if let Some(tensor) = self.tensors.get_mut(&old) {
            tensor.remove_target(op);
        }
        if let Some(tensor) = self.tensors.get_mut(&new) {
            tensor.add_target(op);
        }
        self.sorted = false;

        let mut affected = OpList::new();
        affected.push(op);
        affected.extend(old_source);
        affected.extend(new_source);
        self.refresh_adjacency(affected);
        Ok(())
    }

    /// Make `op` read `new` at input position `index` only
    pub(crate) fn replace_input_at(
        &mut self,
        op: OpId,
        index: usize,
        new: TensorId,
    ) -> GraphResult<()> {
        let old = self
            .require_operator(op)?
            .inputs()
            .get(index)
            .copied()
            .ok_or_else(|| {
                GraphError::InvalidOperator(format!("operator {} has no input {}", op, index))
            })?;
        let old_source = self.require_tensor(old)?.source();
        let new_source = self.require_tensor(new)?.source();

        let mut still_reads_old = false;
        if let Some(operator) = self.ops.get_mut(&op) {
            let inputs = operator.inputs_mut();
            inputs[index] = new;
            still_reads_old = inputs.contains(&old);
        }
        if !still_reads_old {
            if let Some(tensor) = self.tensors.get_mut(&old) {
                tensor.remove_target(op);
            }
        }
        if let Some(tensor) = self.tensors.get_mut(&new) {
            tensor.add_target(op);
        }
        self.sorted = false;

        let mut affected = OpList::new();
        affected.push(op);
        affected.extend(old_source);
        affected.extend(new_source);
        self.refresh_adjacency(affected);
        Ok(())
    }

    /// Unlink `op` from all of its tensors; the operator itself stays in place
    ///
    /// Returns the inputs that lost `op` as a consumer.
    pub(crate) fn detach_operator(&mut self, op: OpId) -> GraphResult<Vec<TensorId>> {
        let operator = self.require_operator(op)?;
        let inputs: Vec<TensorId> = operator.inputs().to_vec();
        let outputs: Vec<TensorId> = operator.outputs().to_vec();

        let mut affected = OpList::new();
        for input in &inputs {
            if let Some(tensor) = self.tensors.get_mut(input) {
                tensor.remove_target(op);
                affected.extend(tensor.source());
            }
        }
        for output in &outputs {
            if let Some(tensor) = self.tensors.get_mut(output) {
                if tensor.source() == Some(op) {
                    tensor.set_source(None);
                }
                affected.extend(tensor.targets().iter().copied());
            }
        }
        self.sorted = false;

        affected.push(op);
        self.refresh_adjacency(affected);
        Ok(inputs)
    }

    /// Delete every operator and tensor marked in `plan`
    ///
    /// Operators are detached first so no surviving tensor keeps a link to a
    /// deleted operator. Relative order of the survivors is preserved.
    pub(crate) fn apply_removals(&mut self, plan: &RemovalPlan) -> GraphResult<()> {
        for op in plan.operators() {
            if self.ops.contains_key(&op) {
                self.detach_operator(op)?;
            }
        }
        for op in plan.operators() {
            self.ops.shift_remove(&op);
        }
        for tensor in plan.tensors() {
            self.tensors.shift_remove(&tensor);
        }
        if !plan.is_empty() {
            self.sorted = false;
        }
        debug!(
            ops = plan.ops.len(),
            tensors = plan.tensors.len(),
            "applied removals"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{OpKind, UnaryOp};
    use crate::runtime::NativeRuntime;
    use crate::tensor::DataType;
    use std::rc::Rc;

    #[test]
    fn test_replace_input_updates_links() {
        let mut g = Graph::new(Rc::new(NativeRuntime::new()));
        let x = g.add_tensor(vec![4], DataType::Float32);
        let y = g.add_tensor(vec![4], DataType::Float32);
        let z = g.add_tensor(vec![4], DataType::Float32);
        let relu = g.add_operator(OpKind::Unary(UnaryOp::Relu), &[x], &[y]).unwrap();
        let tanh = g.add_operator(OpKind::Unary(UnaryOp::Tanh), &[y], &[z]).unwrap();

        g.replace_input(tanh, y, x).unwrap();

        assert_eq!(g.operator(tanh).unwrap().inputs(), &[x]);
        assert!(g.tensor(y).unwrap().targets().is_empty());
        assert_eq!(g.tensor(x).unwrap().targets(), &[relu, tanh]);
        assert!(g.operator(tanh).unwrap().predecessors().is_empty());
        assert!(g.operator(relu).unwrap().successors().is_empty());
    }

    #[test]
    fn test_replace_input_at_keeps_other_position() {
        let mut g = Graph::new(Rc::new(NativeRuntime::new()));
        let x = g.add_tensor(vec![2, 2], DataType::Float32);
        let t = g.add_tensor(vec![2, 2], DataType::Float32);
        let y = g.add_tensor(vec![2, 2], DataType::Float32);
        let tr = g.add_transpose(x, t, vec![1, 0]).unwrap();
        let mm = g.add_matmul(t, t, y, false, false).unwrap();

        g.replace_input_at(mm, 0, x).unwrap();

        assert_eq!(g.operator(mm).unwrap().inputs(), &[x, t]);
        assert_eq!(g.tensor(t).unwrap().targets(), &[mm]);
        assert_eq!(g.operator(mm).unwrap().predecessors(), &[tr]);

        g.replace_input_at(mm, 1, x).unwrap();

        assert!(g.tensor(t).unwrap().targets().is_empty());
        assert!(g.operator(mm).unwrap().predecessors().is_empty());
        assert!(g.replace_input_at(mm, 2, x).is_err());
    }

    #[test]
    fn test_apply_removals() {
        let mut g = Graph::new(Rc::new(NativeRuntime::new()));
        let x = g.add_tensor(vec![4], DataType::Float32);
        let y = g.add_tensor(vec![4], DataType::Float32);
        let z = g.add_tensor(vec![4], DataType::Float32);
        let relu = g.add_operator(OpKind::Unary(UnaryOp::Relu), &[x], &[y]).unwrap();
        let tanh = g.add_operator(OpKind::Unary(UnaryOp::Tanh), &[y], &[z]).unwrap();

        let mut plan = RemovalPlan::new();
        plan.remove_operator(tanh);
        plan.remove_tensor(z);
        g.apply_removals(&plan).unwrap();

        assert!(!g.has_operator(tanh));
        assert!(!g.has_tensor(z));
        assert!(g.tensor(y).unwrap().targets().is_empty());
        assert!(g.operator(relu).unwrap().successors().is_empty());
    }

    #[test]
    fn test_removal_plan_membership() {
        let mut plan = RemovalPlan::new();
        assert!(plan.is_empty());

        plan.queue_orphan(TensorId(7));
        assert!(!plan.is_empty());
        assert_eq!(plan.pop_orphan(), Some(TensorId(7)));

        plan.remove_operator(OpId(3));
        assert!(plan.removes_operator(OpId(3)));
        assert!(!plan.removes_tensor(TensorId(3)));
    }
}
