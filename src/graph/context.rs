//! Graph container
//!
//! `Graph` owns every tensor and operator of a dataflow graph together with
//! the allocator used to plan their memory.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::allocator::Allocator;
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::operator::{MatMulAttrs, OpKind, Operator, TransposeAttrs};
use crate::runtime::Runtime;
use crate::tensor::{DataType, Shape, Tensor};

use super::maps::{OpId, OperatorMap, TensorId, TensorList, TensorMap};

/// Dataflow graph of tensors and operators
#[derive(Debug)]
pub struct Graph {
    pub(crate) runtime: Rc<dyn Runtime>,
    pub(crate) config: GraphConfig,
    /// Tensors in insertion order
    pub(crate) tensors: TensorMap,
    /// Operators; topological order when `sorted` is set
    pub(crate) ops: OperatorMap,
    pub(crate) allocator: Allocator,
    pub(crate) sorted: bool,
}

impl Graph {
    /// Create an empty graph on `runtime` with the default configuration
    pub fn new(runtime: Rc<dyn Runtime>) -> Self {
        Self {
            allocator: Allocator::new(runtime.clone()),
            runtime,
            config: GraphConfig::default(),
            tensors: TensorMap::default(),
            ops: OperatorMap::default(),
            sorted: false,
        }
    }

    /// Create an empty graph with a custom configuration
    pub fn with_config(runtime: Rc<dyn Runtime>, config: GraphConfig) -> GraphResult<Self> {
        Ok(Self {
            allocator: Allocator::with_alignment(runtime.clone(), config.alignment)?,
            runtime,
            config,
            tensors: TensorMap::default(),
            ops: OperatorMap::default(),
            sorted: false,
        })
    }

    // ========================================================================
    // Tensors
    // ========================================================================

    /// Create a tensor on the graph's runtime
    pub fn add_tensor(&mut self, shape: Shape, dtype: DataType) -> TensorId {
        let tensor = Tensor::new(shape, dtype, self.runtime.clone());
        let id = tensor.guid();
        self.tensors.insert(id, tensor);
        id
    }

    /// Insert a tensor created elsewhere
    ///
    /// The tensor must live on the same runtime as the graph.
    pub fn add_existing_tensor(&mut self, tensor: Tensor) -> GraphResult<TensorId> {
        if !Rc::ptr_eq(tensor.runtime(), &self.runtime) {
            return Err(GraphError::RuntimeMismatch {
                expected: self.runtime.name(),
                found: tensor.runtime().name(),
            });
        }
        if self.tensors.values().any(|t| t.fuid() == tensor.fuid()) {
            return Err(GraphError::InvalidGraphState(format!(
                "tensor with FUID {} already exists",
                tensor.fuid()
            )));
        }
        let id = tensor.guid();
        self.tensors.insert(id, tensor);
        Ok(id)
    }

    /// Insert several tensors created elsewhere
    pub fn add_tensors(
        &mut self,
        tensors: impl IntoIterator<Item = Tensor>,
    ) -> GraphResult<Vec<TensorId>> {
        tensors
            .into_iter()
            .map(|t| self.add_existing_tensor(t))
            .collect()
    }

    // ========================================================================
    // Operators
    // ========================================================================

    /// Insert an operator and connect it to its tensors
    ///
    /// Input targets, output sources and the predecessor/successor caches of
    /// the operator and its neighbors are all updated.
    pub fn add_operator(
        &mut self,
        kind: OpKind,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> GraphResult<OpId> {
        self.validate_new_operator(&kind, inputs, outputs)?;

        let op = Operator::new(
            kind,
            inputs.iter().copied().collect(),
            outputs.iter().copied().collect(),
        );
        let id = op.guid();
        debug!(op = %id, kind = %op.kind(), "add operator");

        for input in inputs {
            if let Some(tensor) = self.tensors.get_mut(input) {
                tensor.add_target(id);
            }
        }
        for output in outputs {
            if let Some(tensor) = self.tensors.get_mut(output) {
                tensor.set_source(Some(id));
            }
        }
        self.ops.insert(id, op);
        self.sorted = false;

        let affected = self.neighborhood(id);
        self.refresh_adjacency(affected);
        Ok(id)
    }

    /// Add `c = op(a) · op(b)`
    pub fn add_matmul(
        &mut self,
        a: TensorId,
        b: TensorId,
        c: TensorId,
        trans_a: bool,
        trans_b: bool,
    ) -> GraphResult<OpId> {
        self.add_operator(
            OpKind::MatMul(MatMulAttrs::new(trans_a, trans_b)),
            &[a, b],
            &[c],
        )
    }

    /// Add `output = transpose(input, permute)`
    pub fn add_transpose(
        &mut self,
        input: TensorId,
        output: TensorId,
        permute: Vec<usize>,
    ) -> GraphResult<OpId> {
        let attrs = TransposeAttrs::new(permute)?;
        self.add_operator(OpKind::Transpose(attrs), &[input], &[output])
    }

    fn validate_new_operator(
        &self,
        kind: &OpKind,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> GraphResult<()> {
        if let Some((n_in, n_out)) = kind.arity() {
            if inputs.len() != n_in || outputs.len() != n_out {
                return Err(GraphError::InvalidOperator(format!(
                    "{} expects {} inputs and {} outputs, got {} and {}",
                    kind.op_type(),
                    n_in,
                    n_out,
                    inputs.len(),
                    outputs.len()
                )));
            }
        }

        let mut seen = FxHashSet::default();
        for output in outputs {
            let tensor = self.require_tensor(*output)?;
            if let Some(producer) = tensor.source() {
                return Err(GraphError::InvalidGraphState(format!(
                    "tensor {} is already produced by operator {}",
                    output, producer
                )));
            }
            if !seen.insert(*output) {
                return Err(GraphError::InvalidOperator(format!(
                    "tensor {} listed twice as an output",
                    output
                )));
            }
        }

        let input_shapes = inputs
            .iter()
            .map(|id| self.require_tensor(*id).map(Tensor::shape))
            .collect::<GraphResult<Vec<_>>>()?;
        let output_shapes: Vec<&[usize]> = outputs
            .iter()
            .filter_map(|id| self.tensors.get(id).map(Tensor::shape))
            .collect();

        // Rank and dimension preconditions of the kind.
        kind.infer_shapes(&input_shapes, &output_shapes)?;
        Ok(())
    }

    pub(crate) fn require_tensor(&self, id: TensorId) -> GraphResult<&Tensor> {
        self.tensors.get(&id).ok_or_else(|| {
            GraphError::InvalidGraphState(format!("tensor {} is not in the graph", id))
        })
    }

    pub(crate) fn require_operator(&self, id: OpId) -> GraphResult<&Operator> {
        self.ops.get(&id).ok_or_else(|| {
            GraphError::InvalidGraphState(format!("operator {} is not in the graph", id))
        })
    }

    /// Input list of an operator, cloned for use while mutating the graph
    pub(crate) fn inputs_of(&self, id: OpId) -> TensorList {
        self.ops
            .get(&id)
            .map(|op| op.inputs().iter().copied().collect())
            .unwrap_or_default()
    }
}
