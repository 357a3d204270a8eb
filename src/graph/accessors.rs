//! Graph lookups and the textual dump

use std::fmt;
use std::rc::Rc;

use crate::allocator::Allocator;
use crate::config::GraphConfig;
use crate::operator::Operator;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

use super::context::Graph;
use super::maps::{Fuid, OpId, TensorId};

impl Graph {
    // ========================================================================
    // Tensor accessors
    // ========================================================================

    /// Get a tensor by id
    pub fn tensor(&self, id: TensorId) -> Option<&Tensor> {
        self.tensors.get(&id)
    }

    /// Find a tensor by functional id
    pub fn tensor_by_fuid(&self, fuid: Fuid) -> Option<&Tensor> {
        self.tensors.values().find(|t| t.fuid() == fuid)
    }

    /// Check if a tensor exists
    pub fn has_tensor(&self, id: TensorId) -> bool {
        self.tensors.contains_key(&id)
    }

    /// Iterate over tensors in insertion order
    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    /// Number of tensors
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    // ========================================================================
    // Operator accessors
    // ========================================================================

    /// Get an operator by id
    pub fn operator(&self, id: OpId) -> Option<&Operator> {
        self.ops.get(&id)
    }

    /// Check if an operator exists
    pub fn has_operator(&self, id: OpId) -> bool {
        self.ops.contains_key(&id)
    }

    /// Iterate over operators; topological order once sorted
    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.ops.values()
    }

    /// Operator ids in current order
    pub fn operator_ids(&self) -> impl Iterator<Item = OpId> + '_ {
        self.ops.keys().copied()
    }

    /// Number of operators
    pub fn operator_count(&self) -> usize {
        self.ops.len()
    }

    /// Find operators by type name
    pub fn find_operators_by_type<'a>(
        &'a self,
        op_type: &'a str,
    ) -> impl Iterator<Item = &'a Operator> + 'a {
        self.ops.values().filter(move |op| op.op_type() == op_type)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Get the producer of a tensor
    pub fn producer(&self, tensor: TensorId) -> Option<&Operator> {
        self.tensors
            .get(&tensor)
            .and_then(Tensor::source)
            .and_then(|op| self.ops.get(&op))
    }

    /// Get the consumers of a tensor
    pub fn consumers(&self, tensor: TensorId) -> Vec<&Operator> {
        self.tensors
            .get(&tensor)
            .map(|t| t.targets().iter().filter_map(|op| self.ops.get(op)).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Whether operators are in topological order
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Runtime every tensor of this graph lives on
    pub fn runtime(&self) -> &Rc<dyn Runtime> {
        &self.runtime
    }

    /// Memory planner of this graph
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Active configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph Tensors:")?;
        for tensor in self.tensors.values() {
            writeln!(f, "{}", tensor)?;
        }

        writeln!(f, "Graph operators:")?;
        for op in self.ops.values() {
            let preds: Vec<u64> = op.predecessors().iter().map(|o| o.guid()).collect();
            let succs: Vec<u64> = op.successors().iter().map(|o| o.guid()).collect();
            writeln!(
                f,
                "OP {}, pred {:?}, succ {:?}, {}",
                op.guid(),
                preds,
                succs,
                op
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{OpKind, UnaryOp};
    use crate::runtime::NativeRuntime;
    use crate::tensor::DataType;

    fn make_chain() -> (Graph, TensorId, TensorId, OpId, OpId) {
        let mut g = Graph::new(Rc::new(NativeRuntime::new()));
        let x = g.add_tensor(vec![2, 3], DataType::Float32);
        let y = g.add_tensor(vec![2, 3], DataType::Float32);
        let z = g.add_tensor(vec![2, 3], DataType::Float32);
        let relu = g.add_operator(OpKind::Unary(UnaryOp::Relu), &[x], &[y]).unwrap();
        let tanh = g.add_operator(OpKind::Unary(UnaryOp::Tanh), &[y], &[z]).unwrap();
        (g, x, y, relu, tanh)
    }

    #[test]
    fn test_producer_and_consumers() {
        let (g, x, y, relu, tanh) = make_chain();

        assert!(g.producer(x).is_none());
        assert_eq!(g.producer(y).unwrap().guid(), relu);
        let consumers = g.consumers(y);
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].guid(), tanh);
    }

    #[test]
    fn test_tensor_by_fuid() {
        let (g, x, ..) = make_chain();
        let fuid = g.tensor(x).unwrap().fuid();
        assert_eq!(g.tensor_by_fuid(fuid).unwrap().guid(), x);
    }

    #[test]
    fn test_find_by_type() {
        let (g, ..) = make_chain();
        assert_eq!(g.find_operators_by_type("Relu").count(), 1);
        assert_eq!(g.find_operators_by_type("MatMul").count(), 0);
    }

    #[test]
    fn test_display_dump() {
        let (g, _, _, relu, tanh) = make_chain();
        let dump = g.to_string();

        assert!(dump.starts_with("Graph Tensors:\n"));
        assert!(dump.contains("Graph operators:\n"));
        assert!(dump.contains(&format!("OP {}, pred [], succ [{}], Relu", relu, tanh)));
        assert!(dump.contains(&format!("OP {}, pred [{}], succ [], Tanh", tanh, relu)));
    }
}
