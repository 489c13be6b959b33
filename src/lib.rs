//! # framepool
//!
//! Per-frame GPU buffer suballocation for Rust renderers.
//!
//! ## Features
//!
//! - Buffer blocks: bump allocation inside one backing buffer, reset per frame
//! - Buffer pools: blocks recycled across frames, grown on demand, never
//!   released before teardown
//! - Regions that detect use after reset (generation check, no borrow needed)
//! - Frame buffers: one pool per usage and recording thread, handed to
//!   workers as disjoint `ThreadBuffers`
//! - Frame ring for frames in flight
//! - Pluggable backends: host memory always, Vulkan via `gpu-allocator`
//! - Coded diagnostics with optional strict mode
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use framepool::{BufferPool, BufferUsage, HostAllocator};
//!
//! let allocator = Arc::new(HostAllocator::new());
//! let mut pool = BufferPool::new(allocator, 4096, BufferUsage::UNIFORM_BUFFER)?;
//!
//! // Render loop
//! let block = pool.request_buffer_block(100)?;
//! let region = block.allocate(64)?;
//! region.update(0, &[0u8; 64])?;
//! // ... bind region.buffer_handle() at region.offset(), submit ...
//! pool.reset();
//! # Ok::<(), framepool::PoolError>(())
//! ```

pub mod api;
pub mod diagnostics;
pub mod gpu;

mod allocators;
mod sync;
mod util;

// Re-export public API at crate root for convenience
pub use allocators::block::BufferBlock;
pub use allocators::pool::BufferPool;
pub use allocators::region::BufferAllocation;

pub use api::config::{FrameBuffersConfig, PoolConfig, PromotionPolicy};
pub use api::error::PoolError;
pub use api::frame::{FrameBuffers, FrameRing, ThreadBuffers};
pub use api::stats::PoolStats;

// Backends
pub use gpu::{
    BufferUsage, DeviceLimits, DeviceSize, GpuAllocError, GpuAllocStats, GpuAllocator, GpuBuffer,
    HostAllocator, HostBuffer, MemoryType,
};

// Diagnostics
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use diagnostics::{set_strict_mode, StrictMode, StrictModeGuard};
pub use diagnostics::{BP001, BP002, BP003, BP101, BP901};

// Size helpers
pub use util::size::{format_bytes, kb, mb};
