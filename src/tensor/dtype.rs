//! Element data types
//!
//! Only the widths matter to the planner; numeric semantics belong to the
//! kernels.

use std::fmt;

/// Element data type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit IEEE float
    Float32,
    /// 16-bit IEEE float
    Float16,
    /// bfloat16
    BFloat16,
    /// 64-bit IEEE float
    Float64,
    /// signed 8-bit integer
    Int8,
    /// signed 16-bit integer
    Int16,
    /// signed 32-bit integer
    Int32,
    /// signed 64-bit integer
    Int64,
    /// unsigned 8-bit integer
    UInt8,
    /// unsigned 16-bit integer
    UInt16,
    /// unsigned 32-bit integer
    UInt32,
    /// unsigned 64-bit integer
    UInt64,
    /// boolean stored as one byte
    Bool,
}

impl DataType {
    /// Size in bytes of one element
    pub fn size(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 | DataType::Bool => 1,
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 | DataType::UInt16 => 2,
            DataType::Float32 | DataType::Int32 | DataType::UInt32 => 4,
            DataType::Float64 | DataType::Int64 | DataType::UInt64 => 8,
        }
    }

    /// Short name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            DataType::Float32 => "Float32",
            DataType::Float16 => "Float16",
            DataType::BFloat16 => "BFloat16",
            DataType::Float64 => "Float64",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::UInt8 => "UInt8",
            DataType::UInt16 => "UInt16",
            DataType::UInt32 => "UInt32",
            DataType::UInt64 => "UInt64",
            DataType::Bool => "Bool",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
