//! Memory planning for tensor storage

use tracing::{debug, info};

use crate::allocator::AllocatorInfo;
use crate::error::{GraphError, GraphResult};
use crate::tensor::DataBlob;

use super::context::Graph;
use super::maps::TensorId;

impl Graph {
    /// Place every tensor inside one arena region and bind the buffer
    ///
    /// Tensors are laid out back to back in tensor-list order starting at the
    /// offset the allocator returns for the total footprint. Planning is a
    /// one-shot step: the allocator is bound afterwards and a second call
    /// fails with [`GraphError::AllocatorMisuse`].
    pub fn data_malloc(&mut self) -> GraphResult<AllocatorInfo> {
        self.ensure_sorted()?;
        if self.allocator.is_bound() {
            return Err(GraphError::AllocatorMisuse(
                "memory of this graph is already planned".to_string(),
            ));
        }

        let total = self
            .tensors
            .values()
            .try_fold(0usize, |acc, t| acc.checked_add(t.bytes()))
            .ok_or_else(|| {
                GraphError::AllocatorMisuse("total tensor footprint overflows".to_string())
            })?;
        let base = self.allocator.alloc(total)?;
        let buffer = self.allocator.get_buffer()?;

        let mut running = 0;
        let layout: Vec<(TensorId, usize)> = self
            .tensors
            .values()
            .map(|t| {
                let offset = base + running;
                running += t.bytes();
                (t.guid(), offset)
            })
            .collect();

        for (id, offset) in layout {
            if let Some(tensor) = self.tensors.get_mut(&id) {
                let len = tensor.bytes();
                debug!(tensor = %id, offset, len, "bind tensor");
                tensor.set_data(DataBlob {
                    buffer,
                    offset,
                    len,
                });
            }
        }

        let stats = self.allocator.info();
        info!(tensors = self.tensors.len(), total, "{}", stats);
        Ok(stats)
    }
}
