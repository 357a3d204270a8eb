//! Dataflow graph of tensors and operators
//!
//! This module provides the core infrastructure for building and planning
//! graphs:
//!
//! - [`Graph`]: owns every tensor and operator, keyed by GUID
//! - [`maps`]: id types and the collections the graph is built from
//! - [`RemovalPlan`]: deletions collected by rewrite passes
//!
//! # Overview
//!
//! Tensors and operators reference each other by id. Each tensor knows its
//! producing operator (`source`) and its consumers (`targets`); each operator
//! caches its predecessor and successor operators, which the graph recomputes
//! whenever a link changes.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tensor_planner::prelude::*;
//!
//! let mut graph = Graph::new(Rc::new(NativeRuntime::new()));
//! let a = graph.add_tensor(vec![4, 3], DataType::Float32);
//! let at = graph.add_tensor(vec![3, 4], DataType::Float32);
//! let b = graph.add_tensor(vec![4, 5], DataType::Float32);
//! let c = graph.add_tensor(vec![3, 5], DataType::Float32);
//!
//! graph.add_transpose(a, at, vec![1, 0])?;
//! let mm = graph.add_matmul(at, b, c, false, false)?;
//!
//! graph.optimize()?;
//! graph.shape_infer()?;
//! let info = graph.data_malloc()?;
//!
//! assert!(graph.operator(mm).unwrap().as_matmul().unwrap().trans_a);
//! assert!(info.peak > 0);
//! # Ok::<(), GraphError>(())
//! ```
//!
//! # Maps
//!
//! | Map | Description |
//! |-----|-------------|
//! | `tensors` | `TensorId` → `Tensor`, insertion order |
//! | `ops` | `OpId` → `Operator`, topological order once sorted |

pub mod accessors;
pub mod context;
pub mod infer;
pub mod maps;
pub mod memory;
pub mod mutators;
pub mod optimize;
pub mod topo;
pub mod validation;

// Re-export main types
pub use context::Graph;
pub use maps::{Fuid, OpId, OpList, OperatorMap, TensorId, TensorList, TensorMap};
pub use mutators::RemovalPlan;
