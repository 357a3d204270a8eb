//! Configuration for graph planning
//!
//! [`GraphConfig`] controls allocator alignment, which rewrite passes
//! `Graph::optimize` runs, and whether the graph is re-validated afterwards.

/// Default allocator alignment in bytes.
///
/// Width of the widest supported element type (`u64`/`f64`).
pub const DEFAULT_ALIGNMENT: usize = std::mem::size_of::<u64>();

/// Which rewrite passes to run during optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassConfig {
    /// Remove Transpose pairs that cancel each other
    pub eliminate_transpose: bool,
    /// Fold last-two-axes Transposes into MatMul flags
    pub fuse_transpose_matmul: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            eliminate_transpose: true,
            fuse_transpose_matmul: true,
        }
    }
}

impl PassConfig {
    /// Enable only the elimination pass
    pub fn eliminate_only() -> Self {
        Self {
            eliminate_transpose: true,
            fuse_transpose_matmul: false,
        }
    }

    /// Enable only the fusion pass
    pub fn fuse_only() -> Self {
        Self {
            eliminate_transpose: false,
            fuse_transpose_matmul: true,
        }
    }

    /// Disable every pass
    pub fn none() -> Self {
        Self {
            eliminate_transpose: false,
            fuse_transpose_matmul: false,
        }
    }
}

/// Graph configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Allocation granularity in bytes (any positive value)
    pub alignment: usize,
    /// Run `check_valid` before the passes and again at the end of `optimize`
    pub validate_after_optimize: bool,
    /// Rewrite passes to run
    pub passes: PassConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            validate_after_optimize: true,
            passes: PassConfig::default(),
        }
    }
}

impl GraphConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the allocator alignment
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Toggle validation around optimization
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_after_optimize = enabled;
        self
    }

    /// Select the rewrite passes
    pub fn with_passes(mut self, passes: PassConfig) -> Self {
        self.passes = passes;
        self
    }
}
