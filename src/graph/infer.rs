//! Shape propagation along topological order

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::tensor::Shape;

use super::context::Graph;
use super::maps::TensorId;

impl Graph {
    /// Re-infer every operator's output shapes from its inputs
    ///
    /// Shapes are staged for the whole graph first and committed only when
    /// every operator succeeded. Updated tensors keep their FUID. Returns the
    /// number of tensors whose shape changed.
    pub fn shape_infer(&mut self) -> GraphResult<usize> {
        self.ensure_sorted()?;

        let mut staged: FxHashMap<TensorId, Shape> = FxHashMap::default();

        for op in self.ops.values() {
            let inferred = {
                let inputs = op
                    .inputs()
                    .iter()
                    .map(|id| self.staged_shape(&staged, *id))
                    .collect::<GraphResult<Vec<_>>>()?;
                let outputs = op
                    .outputs()
                    .iter()
                    .map(|id| self.staged_shape(&staged, *id))
                    .collect::<GraphResult<Vec<_>>>()?;
                op.kind().infer_shapes(&inputs, &outputs)?
            };

            if inferred.len() != op.outputs().len() {
                return Err(GraphError::InvalidGraphState(format!(
                    "operator {} inferred {} shapes for {} outputs",
                    op.guid(),
                    inferred.len(),
                    op.outputs().len()
                )));
            }
            for (output, shape) in op.outputs().iter().zip(inferred) {
                staged.insert(*output, shape);
            }
        }

        let mut changed = 0;
        for (id, shape) in staged {
            if let Some(tensor) = self.tensors.get_mut(&id) {
                if tensor.shape() != shape.as_slice() {
                    debug!(
                        tensor = %id,
                        from = ?tensor.shape(),
                        to = ?shape,
                        "shape updated"
                    );
                    tensor.set_shape(shape);
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn staged_shape<'a>(
        &'a self,
        staged: &'a FxHashMap<TensorId, Shape>,
        id: TensorId,
    ) -> GraphResult<&'a [usize]> {
        match staged.get(&id) {
            Some(shape) => Ok(shape.as_slice()),
            None => self.require_tensor(id).map(|t| t.shape()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{BinaryOp, OpKind};
    use crate::runtime::NativeRuntime;
    use crate::tensor::DataType;
    use std::rc::Rc;

    #[test]
    fn test_propagates_through_chain() {
        let mut g = Graph::new(Rc::new(NativeRuntime::new()));
        let a = g.add_tensor(vec![2, 3, 4], DataType::Float32);
        let b = g.add_tensor(vec![2, 4, 5], DataType::Float32);
        let c = g.add_tensor(vec![1], DataType::Float32);
        let bias = g.add_tensor(vec![5], DataType::Float32);
        let d = g.add_tensor(vec![1], DataType::Float32);
        g.add_matmul(a, b, c, false, false).unwrap();
        g.add_operator(OpKind::Elementwise(BinaryOp::Add), &[c, bias], &[d])
            .unwrap();

        let fuid = g.tensor(d).unwrap().fuid();
        let changed = g.shape_infer().unwrap();

        assert_eq!(changed, 2);
        assert_eq!(g.tensor(c).unwrap().shape(), &[2, 3, 5]);
        assert_eq!(g.tensor(d).unwrap().shape(), &[2, 3, 5]);
        assert_eq!(g.tensor(d).unwrap().fuid(), fuid);
        assert_eq!(g.shape_infer().unwrap(), 0);
    }

    #[test]
    fn test_failure_commits_nothing() {
        let mut g = Graph::new(Rc::new(NativeRuntime::new()));
        let a = g.add_tensor(vec![7, 3], DataType::Float32);
        let b = g.add_tensor(vec![3, 4], DataType::Float32);
        let c = g.add_tensor(vec![7, 4], DataType::Float32);
        let w = g.add_tensor(vec![4, 6], DataType::Float32);
        let d = g.add_tensor(vec![7, 6], DataType::Float32);
        g.add_matmul(a, b, c, false, false).unwrap();
        g.add_matmul(c, w, d, false, false).unwrap();

        // First matmul still infers; the second one no longer does.
        g.tensors.get_mut(&a).unwrap().set_shape(vec![2, 3]);
        g.tensors.get_mut(&w).unwrap().set_shape(vec![5, 6]);

        let err = g.shape_infer().unwrap_err();
        assert!(matches!(err, GraphError::ShapeMismatch(_)));
        assert_eq!(g.tensor(c).unwrap().shape(), &[7, 4]);
    }
}
