//! Optimization entry point

use tracing::info;

use crate::error::GraphResult;
use crate::transformers::{OptimizationPipeline, OptimizeStats};

use super::context::Graph;
use super::mutators::RemovalPlan;

impl Graph {
    /// Run the configured rewrite passes and delete what they left dead
    ///
    /// Fails with [`crate::GraphError::CyclicGraph`] when the operators cannot
    /// be sorted. With `validate_after_optimize` set, the graph is also
    /// checked before any pass runs, so a malformed graph is rejected
    /// untouched. Passes are applied once; a chain of more than two
    /// cancelling Transposes may need another call to collapse fully.
    pub fn optimize(&mut self) -> GraphResult<OptimizeStats> {
        self.ensure_sorted()?;
        if self.config.validate_after_optimize {
            self.check_valid()?;
        }

        let pipeline = OptimizationPipeline::from(&self.config.passes);
        let mut plan = RemovalPlan::new();
        let mut stats = pipeline.run(self, &mut plan)?;

        let ops_before = self.ops.len();
        let tensors_before = self.tensors.len();
        self.apply_removals(&plan)?;
        stats.operators_removed = ops_before - self.ops.len();
        stats.tensors_removed = tensors_before - self.tensors.len();

        // Removal keeps the relative order, so this only restores the flag.
        self.ensure_sorted()?;
        if self.config.validate_after_optimize {
            self.check_valid()?;
        }

        info!(
            operators = self.ops.len(),
            tensors = self.tensors.len(),
            "{}",
            stats
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphConfig, PassConfig};
    use crate::error::GraphError;
    use crate::operator::{BinaryOp, MatMulAttrs, OpKind, UnaryOp};
    use crate::runtime::NativeRuntime;
    use crate::tensor::DataType;
    use std::rc::Rc;

    fn graph() -> Graph {
        Graph::new(Rc::new(NativeRuntime::new()))
    }

    #[test]
    fn test_transpose_pair_collapses() {
        let mut g = graph();
        let x = g.add_tensor(vec![2, 3], DataType::Float32);
        let t1 = g.add_tensor(vec![3, 2], DataType::Float32);
        let t2 = g.add_tensor(vec![2, 3], DataType::Float32);
        let y = g.add_tensor(vec![2, 3], DataType::Float32);
        g.add_transpose(x, t1, vec![1, 0]).unwrap();
        g.add_transpose(t1, t2, vec![1, 0]).unwrap();
        let relu = g.add_operator(OpKind::Unary(UnaryOp::Relu), &[t2], &[y]).unwrap();

        let stats = g.optimize().unwrap();

        assert_eq!(stats.operators_removed, 2);
        assert_eq!(stats.tensors_removed, 2);
        assert_eq!(g.find_operators_by_type("Transpose").count(), 0);
        assert_eq!(g.operator(relu).unwrap().inputs(), &[x]);
        assert!(g.operator(relu).unwrap().predecessors().is_empty());
        assert_eq!(g.tensor(x).unwrap().targets(), &[relu]);
        assert!(!g.has_tensor(t1) && !g.has_tensor(t2));
        assert!(g.is_sorted());
        assert!(g.check_valid().is_ok());
    }

    #[test]
    fn test_transpose_folds_into_matmul() {
        let mut g = graph();
        let a = g.add_tensor(vec![4, 3], DataType::Float32);
        let at = g.add_tensor(vec![3, 4], DataType::Float32);
        let b = g.add_tensor(vec![4, 5], DataType::Float32);
        let c = g.add_tensor(vec![3, 5], DataType::Float32);
        g.add_transpose(a, at, vec![1, 0]).unwrap();
        let mm = g.add_matmul(at, b, c, false, false).unwrap();

        g.optimize().unwrap();

        let op = g.operator(mm).unwrap();
        assert_eq!(op.as_matmul().copied(), Some(MatMulAttrs::new(true, false)));
        assert_eq!(op.inputs(), &[a, b]);
        assert_eq!(g.operator_count(), 1);
        assert!(!g.has_tensor(at));
        assert_eq!(g.shape_infer().unwrap(), 0);
    }

    #[test]
    fn test_upstream_with_other_consumer_kept() {
        let mut g = graph();
        let x = g.add_tensor(vec![2, 3], DataType::Float32);
        let t1 = g.add_tensor(vec![3, 2], DataType::Float32);
        let t2 = g.add_tensor(vec![2, 3], DataType::Float32);
        let y = g.add_tensor(vec![2, 3], DataType::Float32);
        let z = g.add_tensor(vec![3, 2], DataType::Float32);
        let up = g.add_transpose(x, t1, vec![1, 0]).unwrap();
        g.add_transpose(t1, t2, vec![1, 0]).unwrap();
        g.add_operator(OpKind::Unary(UnaryOp::Relu), &[t2], &[y]).unwrap();
        let tanh = g.add_operator(OpKind::Unary(UnaryOp::Tanh), &[t1], &[z]).unwrap();

        let stats = g.optimize().unwrap();

        assert_eq!(stats.operators_removed, 1);
        assert!(g.has_operator(up));
        assert_eq!(g.operator(up).unwrap().successors(), &[tanh]);
    }

    #[test]
    fn test_three_transposes_need_two_runs() {
        let mut g = graph();
        let x = g.add_tensor(vec![2, 3], DataType::Float32);
        let t1 = g.add_tensor(vec![3, 2], DataType::Float32);
        let t2 = g.add_tensor(vec![2, 3], DataType::Float32);
        let t3 = g.add_tensor(vec![3, 2], DataType::Float32);
        let t4 = g.add_tensor(vec![2, 3], DataType::Float32);
        let y = g.add_tensor(vec![2, 3], DataType::Float32);
        g.add_transpose(x, t1, vec![1, 0]).unwrap();
        g.add_transpose(t1, t2, vec![1, 0]).unwrap();
        g.add_transpose(t2, t3, vec![1, 0]).unwrap();
        g.add_transpose(t3, t4, vec![1, 0]).unwrap();
        g.add_operator(OpKind::Unary(UnaryOp::Relu), &[t4], &[y]).unwrap();

        g.optimize().unwrap();
        assert_eq!(g.find_operators_by_type("Transpose").count(), 0);

        let mut g = graph();
        let x = g.add_tensor(vec![2, 3], DataType::Float32);
        let t1 = g.add_tensor(vec![3, 2], DataType::Float32);
        let t2 = g.add_tensor(vec![2, 3], DataType::Float32);
        let t3 = g.add_tensor(vec![3, 2], DataType::Float32);
        let y = g.add_tensor(vec![3, 2], DataType::Float32);
        g.add_transpose(x, t1, vec![1, 0]).unwrap();
        g.add_transpose(t1, t2, vec![1, 0]).unwrap();
        g.add_transpose(t2, t3, vec![1, 0]).unwrap();
        g.add_operator(OpKind::Unary(UnaryOp::Relu), &[t3], &[y]).unwrap();

        g.optimize().unwrap();
        assert_eq!(g.find_operators_by_type("Transpose").count(), 1);
        let stats = g.optimize().unwrap();
        assert!(stats.is_noop());
        assert!(g.check_valid().is_ok());
    }

    #[test]
    fn test_cycle_reported() {
        let mut g = graph();
        let x = g.add_tensor(vec![3], DataType::Float32);
        let y = g.add_tensor(vec![3], DataType::Float32);
        let z = g.add_tensor(vec![3], DataType::Float32);
        g.add_operator(OpKind::Elementwise(BinaryOp::Add), &[x, z], &[y]).unwrap();
        g.add_operator(OpKind::Unary(UnaryOp::Relu), &[y], &[z]).unwrap();

        assert_eq!(g.optimize(), Err(GraphError::CyclicGraph));
    }

    #[test]
    fn test_disabled_passes_leave_graph() {
        let config = GraphConfig::new().with_passes(PassConfig::none());
        let mut g = Graph::with_config(Rc::new(NativeRuntime::new()), config).unwrap();
        let a = g.add_tensor(vec![4, 3], DataType::Float32);
        let at = g.add_tensor(vec![3, 4], DataType::Float32);
        let b = g.add_tensor(vec![4, 5], DataType::Float32);
        let c = g.add_tensor(vec![3, 5], DataType::Float32);
        g.add_transpose(a, at, vec![1, 0]).unwrap();
        g.add_matmul(at, b, c, false, false).unwrap();

        let stats = g.optimize().unwrap();

        assert!(stats.is_noop());
        assert_eq!(g.operator_count(), 2);
    }

    #[test]
    fn test_validation_catches_disconnected_tensor() {
        let mut g = graph();
        g.add_tensor(vec![1], DataType::Float32);
        assert!(matches!(g.optimize(), Err(GraphError::InvalidGraphState(_))));

        let config = GraphConfig::new().with_validation(false);
        let mut g = Graph::with_config(Rc::new(NativeRuntime::new()), config).unwrap();
        g.add_tensor(vec![1], DataType::Float32);
        assert!(g.optimize().is_ok());
    }

    #[test]
    fn test_invalid_graph_left_untouched() {
        let mut g = graph();
        let x = g.add_tensor(vec![2, 3], DataType::Float32);
        let t1 = g.add_tensor(vec![3, 2], DataType::Float32);
        let t2 = g.add_tensor(vec![2, 3], DataType::Float32);
        let y = g.add_tensor(vec![2, 3], DataType::Float32);
        let up = g.add_transpose(x, t1, vec![1, 0]).unwrap();
        let down = g.add_transpose(t1, t2, vec![1, 0]).unwrap();
        let relu = g.add_operator(OpKind::Unary(UnaryOp::Relu), &[t2], &[y]).unwrap();
        let stray = g.add_tensor(vec![5], DataType::Float32);

        assert!(matches!(g.optimize(), Err(GraphError::InvalidGraphState(_))));

        assert_eq!(g.operator_count(), 3);
        assert_eq!(g.tensor_count(), 5);
        assert!(g.has_operator(up) && g.has_operator(down));
        assert!(g.has_tensor(t1) && g.has_tensor(t2) && g.has_tensor(stray));
        assert_eq!(g.operator(relu).unwrap().inputs(), &[t2]);
        assert_eq!(g.operator(relu).unwrap().predecessors(), &[down]);
    }

    #[test]
    fn test_opaque_matmul_name_not_fused() {
        let mut g = graph();
        let a = g.add_tensor(vec![4, 3], DataType::Float32);
        let at = g.add_tensor(vec![3, 4], DataType::Float32);
        let y = g.add_tensor(vec![3, 4], DataType::Float32);
        let tr = g.add_transpose(a, at, vec![1, 0]).unwrap();
        let custom = g
            .add_operator(OpKind::Opaque("MatMul".to_string()), &[at], &[y])
            .unwrap();

        let stats = g.optimize().unwrap();

        assert!(stats.is_noop());
        assert!(g.has_operator(tr));
        assert_eq!(g.operator(custom).unwrap().inputs(), &[at]);
        assert_eq!(g.operator(custom).unwrap().kind(), &OpKind::Opaque("MatMul".to_string()));
    }
}
