//! Error types for table configuration and deserialization.
use std::io;

/// Rejected construction parameters.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The maximum load factor must lie in `(0, 1]`.
    #[error("maximum load factor {0} is outside of (0, 1]")]
    LoadFactor(f32),

    /// A bit width parameter is outside its supported range.
    #[error("{what} width {width} is outside of {min}..={max}")]
    Width {
        /// Which width was rejected.
        what: &'static str,
        /// The rejected width.
        width: u32,
        /// Smallest supported width.
        min: u32,
        /// Largest supported width.
        max: u32,
    },

    /// Elias-gamma displacement buckets need at least one entry.
    #[error("elias-gamma bucket size must be positive")]
    EliasBucketSize,
}

/// Failure to read back a serialized table.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DeserializeError {
    /// The underlying reader failed, including running out of input.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The serialized parameters are not a valid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The stored capacity exponent does not describe an addressable table.
    #[error("capacity exponent {0} is out of range")]
    CapacityLog2(u8),

    /// The stored entry count leaves no free slot in the table.
    #[error("size {size} does not fit a table of capacity {capacity}")]
    Size {
        /// Stored entry count.
        size: usize,
        /// Capacity implied by the stored exponent.
        capacity: usize,
    },

    /// A stored bit width is out of range or disagrees with the other stored widths.
    #[error("invalid {what} width {width}")]
    Width {
        /// Which width was rejected.
        what: &'static str,
        /// The rejected width.
        width: u32,
    },

    /// The stored data disagrees with itself.
    #[error("inconsistent serialized state: {0}")]
    Inconsistent(&'static str),
}
