//! Vulkan backend for backing buffers
//!
//! Buffers are created with `ash` and bound to memory suballocated by
//! `gpu-allocator`. Host-visible buffers stay persistently mapped.

pub mod allocator;
pub mod buffer;

pub use allocator::VulkanAllocator;
pub use buffer::VulkanBuffer;

use super::traits::{DeviceSize, GpuAllocError};

/// Map a `gpu-allocator` failure onto the backend error type.
pub(crate) fn map_allocation_error(
    err: gpu_allocator::AllocationError,
    requested: DeviceSize,
) -> GpuAllocError {
    match err {
        gpu_allocator::AllocationError::OutOfMemory => GpuAllocError::OutOfMemory {
            requested,
            available: 0,
        },
        other => GpuAllocError::BackendError(other.to_string()),
    }
}
