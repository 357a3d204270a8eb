//! Arena allocator for tensor memory planning
//!
//! The allocator hands out *offsets* into a single arena rather than
//! pointers. Planning happens first (`alloc`/`free`), then [`Allocator::get_buffer`]
//! asks the runtime for one buffer sized to the observed peak and freezes
//! the plan.
//!
//! # Algorithm
//!
//! | Step | Behavior |
//! |------|----------|
//! | align | sizes are rounded up to a multiple of the alignment (ceiling division) |
//! | alloc | first-fit over free blocks in address order, else bump `used` |
//! | free | insert, merge with the next block, merge with the previous block |
//! | bind | one runtime allocation of `peak` bytes per allocator lifetime |

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::DEFAULT_ALIGNMENT;
use crate::error::{GraphError, GraphResult};
use crate::runtime::{BufferHandle, Runtime};

/// Lifecycle of an allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorState {
    /// Offsets may still be allocated and freed
    Planning,
    /// The physical buffer exists; the plan is frozen
    Bound(BufferHandle),
}

/// Snapshot of allocator counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocatorInfo {
    /// End of the allocated arena
    pub used: usize,
    /// Largest extent ever reached
    pub peak: usize,
}

impl fmt::Display for AllocatorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Used memory: {}, peak memory: {}", self.used, self.peak)
    }
}

/// Offset-based arena allocator with free-block coalescing
#[derive(Debug)]
pub struct Allocator {
    runtime: Rc<dyn Runtime>,
    alignment: usize,
    used: usize,
    peak: usize,
    /// start offset → block length, address ordered
    free_blocks: BTreeMap<usize, usize>,
    state: AllocatorState,
}

impl Allocator {
    /// Create an allocator with the default alignment
    pub fn new(runtime: Rc<dyn Runtime>) -> Self {
        Self {
            runtime,
            alignment: DEFAULT_ALIGNMENT,
            used: 0,
            peak: 0,
            free_blocks: BTreeMap::new(),
            state: AllocatorState::Planning,
        }
    }

    /// Create an allocator with a custom alignment
    pub fn with_alignment(runtime: Rc<dyn Runtime>, alignment: usize) -> GraphResult<Self> {
        if alignment == 0 {
            return Err(GraphError::AllocatorMisuse(
                "alignment must be positive".to_string(),
            ));
        }
        let mut allocator = Self::new(runtime);
        allocator.alignment = alignment;
        Ok(allocator)
    }

    /// Alignment in bytes
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Current lifecycle state
    pub fn state(&self) -> AllocatorState {
        self.state
    }

    /// Whether the physical buffer has been bound
    pub fn is_bound(&self) -> bool {
        matches!(self.state, AllocatorState::Bound(_))
    }

    /// Round `size` up to the alignment
    ///
    /// Fails with [`GraphError::AllocatorMisuse`] when the rounded size does
    /// not fit in `usize`.
    pub fn aligned_size(&self, size: usize) -> GraphResult<usize> {
        if size == 0 {
            return Ok(0);
        }
        ((size - 1) / self.alignment + 1)
            .checked_mul(self.alignment)
            .ok_or_else(|| {
                GraphError::AllocatorMisuse(format!(
                    "size {} overflows when aligned to {}",
                    size, self.alignment
                ))
            })
    }

    /// Free blocks as `(offset, length)` pairs in address order
    pub fn free_blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.free_blocks.iter().map(|(&start, &len)| (start, len))
    }

    /// Used and peak counters
    pub fn info(&self) -> AllocatorInfo {
        AllocatorInfo {
            used: self.used,
            peak: self.peak,
        }
    }

    fn ensure_planning(&self, operation: &str) -> GraphResult<()> {
        match self.state {
            AllocatorState::Planning => Ok(()),
            AllocatorState::Bound(handle) => Err(GraphError::AllocatorMisuse(format!(
                "{} after buffer {} was bound",
                operation, handle
            ))),
        }
    }

    /// Reserve `size` bytes and return the offset of the region
    pub fn alloc(&mut self, size: usize) -> GraphResult<usize> {
        self.ensure_planning("alloc")?;
        let size = self.aligned_size(size)?;
        if size == 0 {
            return Ok(self.used);
        }

        let fit = self
            .free_blocks
            .iter()
            .find(|&(_, &len)| len >= size)
            .map(|(&start, &len)| (start, len));

        if let Some((start, len)) = fit {
            self.free_blocks.remove(&start);
            if len > size {
                self.free_blocks.insert(start + size, len - size);
            }
            debug!(offset = start, size, "reused free block");
            return Ok(start);
        }

        let offset = self.used;
        self.used = offset.checked_add(size).ok_or_else(|| {
            GraphError::AllocatorMisuse(format!(
                "alloc of {} bytes at offset {} overflows the arena",
                size, offset
            ))
        })?;
        self.peak = self.peak.max(self.used);
        Ok(offset)
    }

    /// Return the region `[addr, addr + size)` to the free list
    pub fn free(&mut self, addr: usize, size: usize) -> GraphResult<()> {
        self.ensure_planning("free")?;
        let size = self.aligned_size(size)?;
        if size == 0 {
            return Ok(());
        }
        let end = match addr.checked_add(size) {
            Some(end) if end <= self.used => end,
            _ => {
                return Err(GraphError::AllocatorMisuse(format!(
                    "free of {} bytes at {} beyond arena end {}",
                    size, addr, self.used
                )));
            }
        };
        if self.overlaps_free_block(addr, end) {
            return Err(GraphError::AllocatorMisuse(format!(
                "double free of [{}, {})",
                addr, end
            )));
        }

        let mut start = addr;
        let mut len = size;

        // next neighbor
        if let Some(next_len) = self.free_blocks.remove(&(start + len)) {
            len += next_len;
        }
        // previous neighbor
        let prev = self
            .free_blocks
            .range(..start)
            .next_back()
            .map(|(&s, &l)| (s, l));
        if let Some((prev_start, prev_len)) = prev {
            if prev_start + prev_len == start {
                self.free_blocks.remove(&prev_start);
                start = prev_start;
                len += prev_len;
            }
        }

        if start + len == self.used {
            // Tail of the arena: give it back to the bump pointer.
            self.used = start;
        } else {
            self.free_blocks.insert(start, len);
        }
        Ok(())
    }

    /// `end` must not exceed `used`, so no block bound overflows
    fn overlaps_free_block(&self, addr: usize, end: usize) -> bool {
        let before = self.free_blocks.range(..=addr).next_back();
        if let Some((&start, &len)) = before {
            if start + len > addr {
                return true;
            }
        }
        self.free_blocks
            .range(addr..)
            .next()
            .is_some_and(|(&start, _)| start < end)
    }

    /// Bind the physical buffer on first call and return its handle
    pub fn get_buffer(&mut self) -> GraphResult<BufferHandle> {
        match self.state {
            AllocatorState::Bound(handle) => Ok(handle),
            AllocatorState::Planning => {
                let handle = self.runtime.allocate(self.peak)?;
                info!(
                    runtime = %self.runtime.name(),
                    bytes = self.peak,
                    %handle,
                    "allocator bound physical buffer"
                );
                self.state = AllocatorState::Bound(handle);
                Ok(handle)
            }
        }
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        if let AllocatorState::Bound(handle) = self.state {
            self.runtime.deallocate(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::NativeRuntime;
    use proptest::prelude::*;

    fn allocator() -> Allocator {
        Allocator::new(Rc::new(NativeRuntime::new()))
    }

    #[test]
    fn test_aligned_size() {
        let alloc = allocator();
        assert_eq!(alloc.aligned_size(0), Ok(0));
        assert_eq!(alloc.aligned_size(1), Ok(8));
        assert_eq!(alloc.aligned_size(8), Ok(8));
        assert_eq!(alloc.aligned_size(9), Ok(16));
    }

    #[test]
    fn test_oversized_requests_rejected() {
        let mut alloc = allocator();
        assert!(matches!(
            alloc.aligned_size(usize::MAX),
            Err(GraphError::AllocatorMisuse(_))
        ));
        assert!(matches!(
            alloc.alloc(usize::MAX),
            Err(GraphError::AllocatorMisuse(_))
        ));
        assert_eq!(alloc.info(), AllocatorInfo::default());

        let a = alloc.alloc(16).unwrap();
        assert!(matches!(
            alloc.alloc(usize::MAX - 7),
            Err(GraphError::AllocatorMisuse(_))
        ));
        assert!(matches!(
            alloc.free(usize::MAX - 3, 8),
            Err(GraphError::AllocatorMisuse(_))
        ));
        assert!(matches!(
            alloc.free(a, usize::MAX),
            Err(GraphError::AllocatorMisuse(_))
        ));
        assert_eq!(alloc.info(), AllocatorInfo { used: 16, peak: 16 });
        assert_eq!(alloc.free_blocks().count(), 0);
    }

    #[test]
    fn test_non_power_of_two_alignment() {
        let alloc = Allocator::with_alignment(Rc::new(NativeRuntime::new()), 12).unwrap();
        assert_eq!(alloc.aligned_size(1), Ok(12));
        assert_eq!(alloc.aligned_size(13), Ok(24));
        assert!(Allocator::with_alignment(Rc::new(NativeRuntime::new()), 0).is_err());
    }

    #[test]
    fn test_bump_allocation() {
        let mut alloc = allocator();
        assert_eq!(alloc.alloc(10).unwrap(), 0);
        assert_eq!(alloc.alloc(8).unwrap(), 16);
        assert_eq!(alloc.info(), AllocatorInfo { used: 24, peak: 24 });
    }

    #[test]
    fn test_first_fit_by_address() {
        let mut alloc = allocator();
        let a = alloc.alloc(32).unwrap();
        let _b = alloc.alloc(8).unwrap();
        let c = alloc.alloc(16).unwrap();
        let _d = alloc.alloc(8).unwrap();

        alloc.free(a, 32).unwrap();
        alloc.free(c, 16).unwrap();

        // Both blocks fit; the lower address wins.
        assert_eq!(alloc.alloc(16).unwrap(), a);
        assert_eq!(alloc.free_blocks().collect::<Vec<_>>(), vec![(16, 16), (40, 16)]);
    }

    #[test]
    fn test_free_merges_both_sides() {
        let mut alloc = allocator();
        let a = alloc.alloc(8).unwrap();
        let b = alloc.alloc(8).unwrap();
        let c = alloc.alloc(8).unwrap();
        let _guard = alloc.alloc(8).unwrap();

        alloc.free(a, 8).unwrap();
        alloc.free(c, 8).unwrap();
        assert_eq!(alloc.free_blocks().count(), 2);

        alloc.free(b, 8).unwrap();
        assert_eq!(alloc.free_blocks().collect::<Vec<_>>(), vec![(0, 24)]);
    }

    #[test]
    fn test_tail_free_shrinks_used_but_not_peak() {
        let mut alloc = allocator();
        let _a = alloc.alloc(8).unwrap();
        let b = alloc.alloc(8).unwrap();

        alloc.free(b, 8).unwrap();
        assert_eq!(alloc.info(), AllocatorInfo { used: 8, peak: 16 });
        assert_eq!(alloc.free_blocks().count(), 0);

        assert_eq!(alloc.alloc(4).unwrap(), 8);
    }

    #[test]
    fn test_double_free_rejected() {
        let mut alloc = allocator();
        let a = alloc.alloc(8).unwrap();
        let _b = alloc.alloc(8).unwrap();
        alloc.free(a, 8).unwrap();

        assert!(matches!(
            alloc.free(a, 8),
            Err(GraphError::AllocatorMisuse(_))
        ));
        assert!(alloc.free(64, 8).is_err());
    }

    #[test]
    fn test_bind_uses_peak_and_is_idempotent() {
        let runtime = Rc::new(NativeRuntime::new());
        let mut alloc = Allocator::new(runtime.clone());
        let _a = alloc.alloc(8).unwrap();
        let b = alloc.alloc(24).unwrap();
        alloc.free(b, 24).unwrap();

        let first = alloc.get_buffer().unwrap();
        let second = alloc.get_buffer().unwrap();

        assert_eq!(first, second);
        assert_eq!(runtime.total_allocations(), 1);
        assert_eq!(runtime.buffer_len(first), Some(32));
    }

    #[test]
    fn test_alloc_and_free_after_bind_fail() {
        let mut alloc = allocator();
        let a = alloc.alloc(8).unwrap();
        alloc.get_buffer().unwrap();

        assert!(alloc.is_bound());
        assert!(matches!(alloc.alloc(8), Err(GraphError::AllocatorMisuse(_))));
        assert!(matches!(alloc.free(a, 8), Err(GraphError::AllocatorMisuse(_))));
    }

    #[test]
    fn test_drop_releases_buffer() {
        let runtime = Rc::new(NativeRuntime::new());
        {
            let mut alloc = Allocator::new(runtime.clone());
            alloc.alloc(16).unwrap();
            alloc.get_buffer().unwrap();
            assert_eq!(runtime.live_allocations(), 1);
        }
        assert_eq!(runtime.live_allocations(), 0);
    }

    #[test]
    fn test_info_display() {
        let info = AllocatorInfo { used: 8, peak: 16 };
        assert_eq!(info.to_string(), "Used memory: 8, peak memory: 16");
    }

    // =====================================================================
    // Property-Based Tests for Allocator Invariants
    // =====================================================================

    #[derive(Debug, Clone)]
    enum Step {
        Alloc(usize),
        Free(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1usize..200).prop_map(Step::Alloc),
            any::<usize>().prop_map(Step::Free),
        ]
    }

    proptest! {
        #[test]
        fn prop_live_regions_disjoint_and_free_list_coalesced(
            steps in proptest::collection::vec(step(), 1..80)
        ) {
            let mut alloc = allocator();
            let mut live: Vec<(usize, usize)> = Vec::new();

            for step in steps {
                match step {
                    Step::Alloc(size) => {
                        let offset = alloc.alloc(size).unwrap();
                        let size = alloc.aligned_size(size).unwrap();
                        prop_assert_eq!(offset % alloc.alignment(), 0);
                        for &(o, s) in &live {
                            prop_assert!(offset + size <= o || o + s <= offset,
                                "region [{}, {}) overlaps [{}, {})", offset, offset + size, o, o + s);
                        }
                        prop_assert!(offset + size <= alloc.info().peak);
                        live.push((offset, size));
                    }
                    Step::Free(pick) => {
                        if live.is_empty() {
                            continue;
                        }
                        let (offset, size) = live.swap_remove(pick % live.len());
                        alloc.free(offset, size).unwrap();

                        let blocks: Vec<_> = alloc.free_blocks().collect();
                        for pair in blocks.windows(2) {
                            prop_assert!(pair[0].0 + pair[0].1 < pair[1].0,
                                "blocks {:?} and {:?} are adjacent or overlap", pair[0], pair[1]);
                        }
                        if let Some(&(start, len)) = blocks.last() {
                            prop_assert!(start + len < alloc.info().used);
                        }
                    }
                }
            }
        }
    }
}
