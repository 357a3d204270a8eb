//! # Tensor Planner
//!
//! Dataflow graph core for tensor programs - Rust implementation.
//!
//! This crate holds a graph of tensors and operators, rewrites it with a few
//! layout-level optimizations, infers shapes and plans the memory every
//! tensor occupies inside a single runtime buffer.
//!
//! ## Features
//!
//! - **Graph**: tensors and operators linked by id, topological ordering
//! - **Optimization**: Transpose pair elimination, Transpose into MatMul fusion
//! - **Shape Inference**: broadcasting and batched MatMul rules
//! - **Memory Planning**: offset allocator with free-block coalescing
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use tensor_planner::prelude::*;
//!
//! let mut graph = Graph::new(Rc::new(NativeRuntime::new()));
//! let x = graph.add_tensor(vec![2, 3], DataType::Float32);
//! let t1 = graph.add_tensor(vec![3, 2], DataType::Float32);
//! let t2 = graph.add_tensor(vec![2, 3], DataType::Float32);
//! let y = graph.add_tensor(vec![2, 3], DataType::Float32);
//!
//! graph.add_transpose(x, t1, vec![1, 0])?;
//! graph.add_transpose(t1, t2, vec![1, 0])?;
//! graph.add_operator(OpKind::Unary(UnaryOp::Relu), &[t2], &[y])?;
//!
//! let stats = graph.optimize()?;
//! assert_eq!(stats.operators_removed, 2);
//! # Ok::<(), GraphError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod allocator;
pub mod config;
pub mod error;
pub mod graph;
pub mod operator;
pub mod runtime;
pub mod tensor;
pub mod transformers;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use tensor_planner::prelude::*`
pub mod prelude {
    pub use crate::allocator::{Allocator, AllocatorInfo, AllocatorState};
    pub use crate::config::{GraphConfig, PassConfig};
    pub use crate::error::{GraphError, GraphResult};
    pub use crate::graph::{Fuid, Graph, OpId, RemovalPlan, TensorId};
    pub use crate::operator::{BinaryOp, MatMulAttrs, OpKind, Operator, TransposeAttrs, UnaryOp};
    pub use crate::runtime::{BufferHandle, NativeRuntime, Runtime};
    pub use crate::tensor::{DataBlob, DataType, Shape, Tensor};
    pub use crate::transformers::{OptimizationPipeline, OptimizeStats, TransformResult};
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use error::{GraphError, GraphResult};
pub use graph::Graph;

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
