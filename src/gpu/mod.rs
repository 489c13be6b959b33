//! Backing-buffer backends
//!
//! Pools never talk to a graphics API directly: they create backing buffers
//! through a [`GpuAllocator`] and write into them through [`GpuBuffer`].
//!
//! ## Backends
//! - `host`: `Vec<u8>` storage, always available
//! - `vulkan`: via the `ash` and `gpu-allocator` crates (enable `gpu-vulkan` feature)

// Always present for API stability: traits define the interface
pub mod traits;
pub use traits::{
    BufferUsage, DeviceLimits, DeviceSize, GpuAllocError, GpuAllocStats, GpuAllocator, GpuBuffer,
    MemoryType,
};

pub mod host;
pub use host::{HostAllocator, HostBuffer};

#[cfg(feature = "gpu-vulkan")]
pub mod vulkan;
