//! Tensor graph entity

use std::fmt;
use std::rc::Rc;

use crate::graph::maps::{push_unique, remove_all, Fuid, OpId, OpList, TensorId};
use crate::runtime::{BufferHandle, Runtime};

use super::dtype::DataType;
use super::shape::{numel, Shape};

/// Memory binding of a tensor inside the planned arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlob {
    /// Buffer owned by the graph's allocator
    pub buffer: BufferHandle,
    /// Byte offset of the tensor inside `buffer`
    pub offset: usize,
    /// Footprint in bytes
    pub len: usize,
}

impl DataBlob {
    /// One past the last byte of the region
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// A tensor node of the dataflow graph
///
/// Links to operators are ids into the owning graph. Only the graph mutates
/// them, so a tensor built with [`Tensor::new`] is always detached.
#[derive(Debug)]
pub struct Tensor {
    guid: TensorId,
    fuid: Fuid,
    shape: Shape,
    dtype: DataType,
    runtime: Rc<dyn Runtime>,
    source: Option<OpId>,
    targets: OpList,
    data: Option<DataBlob>,
}

impl Tensor {
    /// Create a detached tensor on `runtime`
    pub fn new(shape: Shape, dtype: DataType, runtime: Rc<dyn Runtime>) -> Self {
        Self {
            guid: TensorId::fresh(),
            fuid: crate::graph::maps::next_fuid(),
            shape,
            dtype,
            runtime,
            source: None,
            targets: OpList::new(),
            data: None,
        }
    }

    /// Globally unique id
    pub fn guid(&self) -> TensorId {
        self.guid
    }

    /// Functional id
    pub fn fuid(&self) -> Fuid {
        self.fuid
    }

    /// Dimension sizes
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element data type
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Runtime this tensor was created on
    pub fn runtime(&self) -> &Rc<dyn Runtime> {
        &self.runtime
    }

    /// Producing operator, if any
    pub fn source(&self) -> Option<OpId> {
        self.source
    }

    /// Consuming operators
    pub fn targets(&self) -> &[OpId] {
        &self.targets
    }

    /// Memory binding, set by `Graph::data_malloc`
    pub fn data(&self) -> Option<&DataBlob> {
        self.data.as_ref()
    }

    /// Number of elements
    pub fn size(&self) -> usize {
        numel(&self.shape)
    }

    /// Footprint in bytes
    pub fn bytes(&self) -> usize {
        self.size() * self.dtype.size()
    }

    /// Neither produced nor consumed
    pub fn is_disconnected(&self) -> bool {
        self.source.is_none() && self.targets.is_empty()
    }

    pub(crate) fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    pub(crate) fn set_source(&mut self, op: Option<OpId>) {
        self.source = op;
    }

    pub(crate) fn add_target(&mut self, op: OpId) {
        push_unique(&mut self.targets, op);
    }

    pub(crate) fn remove_target(&mut self, op: OpId) {
        remove_all(&mut self.targets, op);
    }

    pub(crate) fn set_data(&mut self, blob: DataBlob) {
        self.data = Some(blob);
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor {}, Fuid {}, shape {:?}, dtype {}",
            self.guid, self.fuid, self.shape, self.dtype
        )?;
        match self.source {
            Some(op) => write!(f, ", source {}", op)?,
            None => write!(f, ", source None")?,
        }
        let targets: Vec<u64> = self.targets.iter().map(|op| op.guid()).collect();
        write!(f, ", targets {:?}", targets)?;
        match &self.data {
            Some(blob) => write!(f, ", data {}+{}", blob.buffer, blob.offset),
            None => write!(f, ", data unbound"),
        }
    }
}
