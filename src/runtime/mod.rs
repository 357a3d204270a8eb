//! Runtime collaborator interface
//!
//! The planner never touches physical memory itself. It asks a [`Runtime`]
//! for exactly one buffer per allocator lifetime and gives it back when the
//! allocator is dropped.
//!
//! [`NativeRuntime`] is a host-memory implementation used by tests and by
//! clients that run kernels on the CPU.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::error::{GraphError, GraphResult};

/// Opaque handle to a buffer owned by a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Device runtime that performs physical allocation
pub trait Runtime: fmt::Debug {
    /// Human-readable runtime name, used in diagnostics
    fn name(&self) -> String;

    /// Allocate `bytes` bytes and return a handle to the buffer
    fn allocate(&self, bytes: usize) -> GraphResult<BufferHandle>;

    /// Release a buffer previously returned by [`Runtime::allocate`]
    fn deallocate(&self, handle: BufferHandle);
}

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Host-memory runtime backed by zeroed `Vec<u8>` buffers
#[derive(Debug)]
pub struct NativeRuntime {
    id: u64,
    next_handle: Cell<u64>,
    buffers: RefCell<FxHashMap<BufferHandle, Vec<u8>>>,
    total_allocations: Cell<usize>,
}

impl NativeRuntime {
    /// Create a new host runtime
    pub fn new() -> Self {
        Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            next_handle: Cell::new(1),
            buffers: RefCell::new(FxHashMap::default()),
            total_allocations: Cell::new(0),
        }
    }

    /// Number of buffers currently held
    pub fn live_allocations(&self) -> usize {
        self.buffers.borrow().len()
    }

    /// Number of `allocate` calls served so far
    pub fn total_allocations(&self) -> usize {
        self.total_allocations.get()
    }

    /// Size in bytes of a live buffer
    pub fn buffer_len(&self, handle: BufferHandle) -> Option<usize> {
        self.buffers.borrow().get(&handle).map(Vec::len)
    }
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for NativeRuntime {
    fn name(&self) -> String {
        format!("native#{}", self.id)
    }

    fn allocate(&self, bytes: usize) -> GraphResult<BufferHandle> {
        let handle = BufferHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);

        let mut buffer = Vec::new();
        buffer.try_reserve_exact(bytes).map_err(|e| {
            GraphError::AllocatorMisuse(format!("host allocation of {} bytes failed: {}", bytes, e))
        })?;
        buffer.resize(bytes, 0);

        self.buffers.borrow_mut().insert(handle, buffer);
        self.total_allocations.set(self.total_allocations.get() + 1);
        Ok(handle)
    }

    fn deallocate(&self, handle: BufferHandle) {
        self.buffers.borrow_mut().remove(&handle);
    }
}
