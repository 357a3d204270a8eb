//! Identifier and map types for the graph arena
//!
//! Tensors and operators live in insertion-ordered maps keyed by their GUID.
//! Every cross reference (tensor source/targets, operator inputs/outputs,
//! predecessors/successors) is an id, never an owning pointer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::operator::Operator;
use crate::tensor::Tensor;

static NEXT_GUID: AtomicU64 = AtomicU64::new(1);
static NEXT_FUID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique GUID
pub(crate) fn next_guid() -> u64 {
    NEXT_GUID.fetch_add(1, Ordering::Relaxed)
}

/// Allocate a fresh functional id
pub(crate) fn next_fuid() -> Fuid {
    Fuid(NEXT_FUID.fetch_add(1, Ordering::Relaxed))
}

/// GUID of a tensor; also its handle inside a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) u64);

/// GUID of an operator; also its handle inside a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) u64);

/// Functional id of a tensor, stable across storage-replacing rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fuid(pub(crate) u64);

impl TensorId {
    pub(crate) fn fresh() -> Self {
        Self(next_guid())
    }

    /// Raw GUID value
    pub fn guid(self) -> u64 {
        self.0
    }
}

impl OpId {
    pub(crate) fn fresh() -> Self {
        Self(next_guid())
    }

    /// Raw GUID value
    pub fn guid(self) -> u64 {
        self.0
    }
}

impl Fuid {
    /// Raw FUID value
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Fuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator id list; most tensors have 1-4 consumers
pub type OpList = SmallVec<[OpId; 4]>;

/// Tensor id list; most operators have 1-2 inputs
pub type TensorList = SmallVec<[TensorId; 2]>;

/// Tensor arena, insertion ordered
pub type TensorMap = IndexMap<TensorId, Tensor>;

/// Operator arena; order is topological once the graph is sorted
pub type OperatorMap = IndexMap<OpId, Operator>;

/// Insert `id` into `list` unless already present
pub(crate) fn push_unique(list: &mut OpList, id: OpId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// Remove every occurrence of `id` from `list`
pub(crate) fn remove_all(list: &mut OpList, id: OpId) {
    list.retain(|other| *other != id);
}
