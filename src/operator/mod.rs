//! Operator entities
//!
//! An [`Operator`] is a graph node tagged with an [`OpKind`]. Kind-specific
//! attributes live inside the variant, so rewrite passes pattern-match on the
//! kind instead of downcasting.
//!
//! | Kind | Inputs | Outputs | Shape rule |
//! |------|--------|---------|------------|
//! | `MatMul` | 2 | 1 | batched matmul with `trans_a`/`trans_b` |
//! | `Transpose` | 1 | 1 | output axis `i` = input axis `permute[i]` |
//! | `Elementwise` | 2 | 1 | bidirectional broadcast |
//! | `Unary` | 1 | 1 | same as input |
//! | `Opaque` | any | any | current output shapes are kept |

pub mod elementwise;
pub mod matmul;
pub mod transpose;

pub use elementwise::{BinaryOp, UnaryOp};
pub use matmul::MatMulAttrs;
pub use transpose::TransposeAttrs;

use std::fmt;

use crate::error::{GraphError, GraphResult};
use crate::graph::maps::{OpId, OpList, TensorId, TensorList};
use crate::tensor::shape::{broadcast_shape, Shape};

/// Operator kind with its attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// Batched matrix multiplication
    MatMul(MatMulAttrs),
    /// Axis permutation
    Transpose(TransposeAttrs),
    /// Broadcasting binary element-wise op
    Elementwise(BinaryOp),
    /// Shape-preserving unary op
    Unary(UnaryOp),
    /// Any other operator, identified by name
    Opaque(String),
}

impl OpKind {
    /// Operator type name
    pub fn op_type(&self) -> &str {
        match self {
            OpKind::MatMul(_) => "MatMul",
            OpKind::Transpose(_) => "Transpose",
            OpKind::Elementwise(op) => op.name(),
            OpKind::Unary(op) => op.name(),
            OpKind::Opaque(name) => name,
        }
    }

    /// Required `(inputs, outputs)` counts, `None` for opaque kinds
    pub fn arity(&self) -> Option<(usize, usize)> {
        match self {
            OpKind::MatMul(_) | OpKind::Elementwise(_) => Some((2, 1)),
            OpKind::Transpose(_) | OpKind::Unary(_) => Some((1, 1)),
            OpKind::Opaque(_) => None,
        }
    }

    /// Infer output shapes from input shapes
    ///
    /// `outputs` holds the current output shapes; opaque kinds return them
    /// unchanged.
    pub fn infer_shapes(&self, inputs: &[&[usize]], outputs: &[&[usize]]) -> GraphResult<Vec<Shape>> {
        if let Some((n_in, _)) = self.arity() {
            if inputs.len() != n_in {
                return Err(GraphError::InvalidOperator(format!(
                    "{} expects {} inputs, got {}",
                    self.op_type(),
                    n_in,
                    inputs.len()
                )));
            }
        }
        match self {
            OpKind::MatMul(attrs) => Ok(vec![attrs.infer_shape(inputs[0], inputs[1])?]),
            OpKind::Transpose(attrs) => Ok(vec![attrs.infer_shape(inputs[0])?]),
            OpKind::Elementwise(_) => Ok(vec![broadcast_shape(inputs[0], inputs[1])?]),
            OpKind::Unary(_) => Ok(vec![inputs[0].to_vec()]),
            OpKind::Opaque(_) => Ok(outputs.iter().map(|s| s.to_vec()).collect()),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::MatMul(attrs) => write!(f, "MatMul({})", attrs),
            OpKind::Transpose(attrs) => write!(f, "Transpose({})", attrs),
            other => f.write_str(other.op_type()),
        }
    }
}

/// Operator graph node
///
/// Predecessors and successors are a cache derived from the tensor
/// source/target links; the graph refreshes them on every link change.
#[derive(Debug)]
pub struct Operator {
    guid: OpId,
    kind: OpKind,
    inputs: TensorList,
    outputs: TensorList,
    predecessors: OpList,
    successors: OpList,
}

impl Operator {
    pub(crate) fn new(kind: OpKind, inputs: TensorList, outputs: TensorList) -> Self {
        Self {
            guid: OpId::fresh(),
            kind,
            inputs,
            outputs,
            predecessors: OpList::new(),
            successors: OpList::new(),
        }
    }

    /// Globally unique id
    pub fn guid(&self) -> OpId {
        self.guid
    }

    /// Kind and attributes
    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    /// Operator type name
    pub fn op_type(&self) -> &str {
        self.kind.op_type()
    }

    /// Input tensors, in order
    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    /// Output tensors, in order
    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }

    /// Operators producing this operator's inputs
    pub fn predecessors(&self) -> &[OpId] {
        &self.predecessors
    }

    /// Operators consuming this operator's outputs
    pub fn successors(&self) -> &[OpId] {
        &self.successors
    }

    /// MatMul attributes, if this is a MatMul
    pub fn as_matmul(&self) -> Option<&MatMulAttrs> {
        match &self.kind {
            OpKind::MatMul(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Transpose attributes, if this is a Transpose
    pub fn as_transpose(&self) -> Option<&TransposeAttrs> {
        match &self.kind {
            OpKind::Transpose(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub(crate) fn kind_mut(&mut self) -> &mut OpKind {
        &mut self.kind
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut TensorList {
        &mut self.inputs
    }

    pub(crate) fn set_adjacency(&mut self, predecessors: OpList, successors: OpList) {
        self.predecessors = predecessors;
        self.successors = successors;
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<u64> = self.inputs.iter().map(|t| t.guid()).collect();
        let outputs: Vec<u64> = self.outputs.iter().map(|t| t.guid()).collect();
        write!(
            f,
            "{}, inputs {:?}, outputs {:?}",
            self.kind, inputs, outputs
        )
    }
}
