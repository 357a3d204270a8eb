//! Tensor entities and utilities
//!
//! This module provides:
//! - The [`Tensor`] graph entity and its memory binding (`entity`)
//! - Element data types (`dtype`)
//! - Shape and broadcasting utilities (`shape`)
//!
//! # Example
//!
//! ```
//! use tensor_planner::tensor::broadcast_shape;
//!
//! let out = broadcast_shape(&[8, 1, 6, 1], &[7, 1, 5]).unwrap();
//! assert_eq!(out, vec![8, 7, 6, 5]);
//! ```

pub mod dtype;
pub mod entity;
pub mod shape;

// Re-export commonly used items
pub use dtype::DataType;
pub use entity::{DataBlob, Tensor};
pub use shape::{broadcast_shape, is_broadcastable, numel, shape_to_string, Shape};
