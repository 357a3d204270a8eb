//! Shape utilities
//!
//! Functions for working with tensor shapes and bidirectional broadcasting.

use crate::error::{GraphError, GraphResult};

/// Ordered dimension sizes
pub type Shape = Vec<usize>;

/// Calculate total number of elements from shape
pub fn numel(shape: &[usize]) -> usize {
    // empty shape is a scalar
    shape.iter().product()
}

/// Left-pad `shape` with 1s up to `rank`
fn padded(shape: &[usize], rank: usize) -> impl Iterator<Item = usize> + '_ {
    std::iter::repeat(1)
        .take(rank - shape.len())
        .chain(shape.iter().copied())
}

/// Broadcast two aligned dimensions
pub(crate) fn broadcast_dim(a: usize, b: usize) -> Option<usize> {
    if a == b || b == 1 {
        Some(a)
    } else if a == 1 {
        Some(b)
    } else {
        None
    }
}

/// Check if two shapes are broadcastable
pub fn is_broadcastable(shape_a: &[usize], shape_b: &[usize]) -> bool {
    broadcast_shape(shape_a, shape_b).is_ok()
}

/// Compute the bidirectional broadcast of two shapes
///
/// Shapes are right-aligned; the shorter one is padded with leading 1s.
/// Each output dimension is the non-1 side, and two non-1 sides must agree.
pub fn broadcast_shape(shape_a: &[usize], shape_b: &[usize]) -> GraphResult<Shape> {
    let rank = shape_a.len().max(shape_b.len());

    padded(shape_a, rank)
        .zip(padded(shape_b, rank))
        .map(|(a, b)| {
            broadcast_dim(a, b).ok_or_else(|| {
                GraphError::ShapeMismatch(format!(
                    "shapes {} and {} are not broadcastable",
                    shape_to_string(shape_a),
                    shape_to_string(shape_b)
                ))
            })
        })
        .collect()
}

/// Format a shape as `[d0, d1, ...]`
pub fn shape_to_string(shape: &[usize]) -> String {
    format!("{:?}", shape)
}
