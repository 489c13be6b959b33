//! Pool error types.

use thiserror::Error;

use crate::gpu::{BufferUsage, DeviceSize, GpuAllocError};

/// Errors returned by blocks, pools, regions and frame buffers.
///
/// No operation retries on its own; growing, retrying or aborting the frame
/// is decided by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The aligned request does not fit in the block's remaining room.
    /// Request a block of at least `requested` bytes from the pool and retry there.
    #[error("block capacity exceeded: {requested} bytes ({aligned} aligned) requested, {remaining} remaining")]
    CapacityExceeded {
        requested: DeviceSize,
        aligned: DeviceSize,
        remaining: DeviceSize,
    },

    /// Zero-sized allocation or block size.
    #[error("zero-sized allocation")]
    ZeroSize,

    /// Rounding the size up to the alignment overflowed.
    #[error("allocation of {0} bytes overflows when aligned")]
    SizeOverflow(DeviceSize),

    /// Creating a backing buffer, or writing into one, failed in the backend.
    #[error("backing buffer failure: {0}")]
    Allocation(#[from] GpuAllocError),

    /// `local_offset + len` exceeds the region.
    #[error("update of {len} bytes at local offset {offset} exceeds region size {size}")]
    RegionOverflow {
        offset: DeviceSize,
        len: DeviceSize,
        size: DeviceSize,
    },

    /// The region's block was reset or dropped after the region was allocated.
    #[error("stale region: its block was reset or dropped")]
    StaleRegion,

    /// Write through the empty sentinel region.
    #[error("write through an empty region")]
    EmptyRegion,

    /// No pool exists for this usage.
    #[error("no buffer pool for usage {0:?}")]
    UnsupportedUsage(BufferUsage),

    /// Thread slot out of range.
    #[error("thread index {index} out of range ({count} thread slots)")]
    InvalidThread { index: usize, count: usize },
}

impl PoolError {
    /// Whether the error is the recoverable "block full" case.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, PoolError::CapacityExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = PoolError::CapacityExceeded { requested: 50, aligned: 64, remaining: 32 };
        assert_eq!(
            err.to_string(),
            "block capacity exceeded: 50 bytes (64 aligned) requested, 32 remaining"
        );
        assert!(err.is_capacity_exceeded());
    }

    #[test]
    fn test_from_backend_error() {
        let err: PoolError = GpuAllocError::OutOfMemory { requested: 1024, available: 0 }.into();
        assert!(matches!(err, PoolError::Allocation(GpuAllocError::OutOfMemory { .. })));
        assert!(!err.is_capacity_exceeded());
        assert!(std::error::Error::source(&err).is_some());
    }
}
