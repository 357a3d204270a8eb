//! Transpose attributes and permutation helpers

use std::fmt;

use crate::error::{GraphError, GraphResult};
use crate::tensor::shape::{shape_to_string, Shape};

/// Attributes of a Transpose: output axis `i` is input axis `permute[i]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposeAttrs {
    permute: Vec<usize>,
}

impl TransposeAttrs {
    /// Create Transpose attributes, checking that `permute` is a permutation
    pub fn new(permute: Vec<usize>) -> GraphResult<Self> {
        let mut seen = vec![false; permute.len()];
        for &axis in &permute {
            match seen.get_mut(axis) {
                Some(flag) if !*flag => *flag = true,
                _ => {
                    return Err(GraphError::InvalidOperator(format!(
                        "{:?} is not a permutation",
                        permute
                    )))
                }
            }
        }
        Ok(Self { permute })
    }

    /// Permutation that swaps the last two axes of a rank-`rank` tensor
    pub fn swap_last_two(rank: usize) -> GraphResult<Self> {
        if rank < 2 {
            return Err(GraphError::InvalidOperator(format!(
                "cannot swap the last two axes of a rank-{} tensor",
                rank
            )));
        }
        let mut permute: Vec<usize> = (0..rank).collect();
        permute.swap(rank - 1, rank - 2);
        Ok(Self { permute })
    }

    /// The permutation
    pub fn permute(&self) -> &[usize] {
        &self.permute
    }

    /// Rank the permutation applies to
    pub fn rank(&self) -> usize {
        self.permute.len()
    }

    /// Whether applying `upstream` then `self` is the identity
    ///
    /// Holds when `self.permute[upstream.permute[i]] == i` for every axis.
    pub fn cancels(&self, upstream: &TransposeAttrs) -> bool {
        self.rank() == upstream.rank()
            && upstream
                .permute
                .iter()
                .enumerate()
                .all(|(i, &p)| self.permute[p] == i)
    }

    /// Whether only the last two axes are swapped and every other axis is fixed
    pub fn swaps_last_two_axes(&self) -> bool {
        Self::swap_last_two(self.rank()).is_ok_and(|swap| *self == swap)
    }

    /// Output shape for an input of shape `input`
    pub fn infer_shape(&self, input: &[usize]) -> GraphResult<Shape> {
        if input.len() != self.rank() {
            return Err(GraphError::ShapeMismatch(format!(
                "Transpose permutation {:?} does not match input shape {}",
                self.permute,
                shape_to_string(input)
            )));
        }
        Ok(self.permute.iter().map(|&axis| input[axis]).collect())
    }
}

impl fmt::Display for TransposeAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "permute={:?}", self.permute)
    }
}
