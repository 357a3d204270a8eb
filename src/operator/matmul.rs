//! MatMul attributes and shape inference

use std::fmt;

use crate::error::{GraphError, GraphResult};
use crate::tensor::shape::{broadcast_dim, shape_to_string, Shape};

/// Attributes of a (batched) matrix multiplication `C = op(A) · op(B)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatMulAttrs {
    /// Transpose the last two axes of A before multiplying
    pub trans_a: bool,
    /// Transpose the last two axes of B before multiplying
    pub trans_b: bool,
}

impl MatMulAttrs {
    /// Create MatMul attributes
    pub fn new(trans_a: bool, trans_b: bool) -> Self {
        Self { trans_a, trans_b }
    }

    /// Output shape of `op(A) · op(B)`
    ///
    /// Batch axes are broadcast pairwise from the right, stopping two axes
    /// before the end of each operand.
    pub fn infer_shape(&self, shape_a: &[usize], shape_b: &[usize]) -> GraphResult<Shape> {
        if shape_a.len() < 2 || shape_b.len() < 2 {
            return Err(GraphError::ShapeMismatch(format!(
                "MatMul requires rank >= 2, got {} and {}",
                shape_to_string(shape_a),
                shape_to_string(shape_b)
            )));
        }

        let mut a = shape_a.to_vec();
        let mut b = shape_b.to_vec();
        let (ra, rb) = (a.len(), b.len());
        if self.trans_a {
            a.swap(ra - 1, ra - 2);
        }
        if self.trans_b {
            b.swap(rb - 1, rb - 2);
        }

        let (m, k) = (a[ra - 2], a[ra - 1]);
        let (k_b, n) = (b[rb - 2], b[rb - 1]);
        if k != k_b {
            return Err(GraphError::ShapeMismatch(format!(
                "MatMul inner dimensions differ: {}{} x {}{}",
                shape_to_string(shape_a),
                if self.trans_a { "^T" } else { "" },
                shape_to_string(shape_b),
                if self.trans_b { "^T" } else { "" },
            )));
        }

        let batch_a = &a[..ra - 2];
        let batch_b = &b[..rb - 2];
        let rank = batch_a.len().max(batch_b.len());
        let mut out = Vec::with_capacity(rank + 2);
        for i in 0..rank {
            let da = (i + batch_a.len()).checked_sub(rank).map_or(1, |j| batch_a[j]);
            let db = (i + batch_b.len()).checked_sub(rank).map_or(1, |j| batch_b[j]);
            let dim = broadcast_dim(da, db).ok_or_else(|| {
                GraphError::ShapeMismatch(format!(
                    "MatMul batch dimensions {} and {} are not broadcastable",
                    shape_to_string(batch_a),
                    shape_to_string(batch_b)
                ))
            })?;
            out.push(dim);
        }
        out.push(m);
        out.push(n);
        Ok(out)
    }
}

impl fmt::Display for MatMulAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}]",
            if self.trans_a { "A^T" } else { "A" },
            if self.trans_b { "B^T" } else { "B" }
        )
    }
}
