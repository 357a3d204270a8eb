//! Topological ordering of operators

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::error::{GraphError, GraphResult};

use super::context::Graph;
use super::maps::OpId;

impl Graph {
    /// Sort operators so every operator follows the producers of its inputs
    ///
    /// Repeatedly scans the unplaced operators and places those whose inputs
    /// are graph inputs or produced by already placed operators. Returns
    /// `false` and leaves the order untouched when a full scan places nothing,
    /// which means the graph has a cycle.
    pub fn topo_sort(&mut self) -> bool {
        if self.sorted {
            return true;
        }

        let mut placed: FxHashSet<OpId> = FxHashSet::default();
        let mut order: Vec<OpId> = Vec::with_capacity(self.ops.len());

        while order.len() < self.ops.len() {
            let mut modified = false;
            for (&id, op) in &self.ops {
                if placed.contains(&id) {
                    continue;
                }
                let ready = op.inputs().iter().all(|input| {
                    match self.tensors.get(input).and_then(|t| t.source()) {
                        None => true,
                        Some(src) => placed.contains(&src),
                    }
                });
                if ready {
                    placed.insert(id);
                    order.push(id);
                    modified = true;
                }
            }
            trace!(placed = order.len(), total = self.ops.len(), "topo_sort scan");
            if !modified {
                debug!(
                    unplaced = self.ops.len() - order.len(),
                    "topo_sort found a cycle"
                );
                return false;
            }
        }

        let mut previous = std::mem::take(&mut self.ops);
        self.ops = order
            .into_iter()
            .filter_map(|id| previous.swap_remove(&id).map(|op| (id, op)))
            .collect();
        self.sorted = true;
        true
    }

    /// Sort, or fail with [`GraphError::CyclicGraph`]
    pub(crate) fn ensure_sorted(&mut self) -> GraphResult<()> {
        if self.topo_sort() {
            Ok(())
        } else {
            Err(GraphError::CyclicGraph)
        }
    }
}
