//! Host-memory backend
//!
//! Backing buffers are plain `Vec<u8>` storage. Used for tests, headless
//! tooling, and as CPU-side staging when no GPU is present.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::traits::*;
use crate::sync::atomics::{AtomicCounter, AtomicGauge};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct HostStats {
    allocation_count: AtomicCounter,
    failed_allocations: AtomicCounter,
    allocated_bytes: AtomicGauge,
    peak_usage: AtomicGauge,
}

/// A backing buffer that just stores bytes in RAM
#[derive(Debug)]
pub struct HostBuffer {
    /// The actual data
    data: Vec<u8>,
    usage: BufferUsage,
    memory_type: MemoryType,
    handle: u64,
    stats: Arc<HostStats>,
}

impl HostBuffer {
    /// View the whole buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl GpuBuffer for HostBuffer {
    fn size(&self) -> DeviceSize {
        self.data.len() as DeviceSize
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    fn raw_handle(&self) -> u64 {
        self.handle
    }

    fn write(&mut self, offset: DeviceSize, data: &[u8]) -> Result<(), GpuAllocError> {
        if !self.memory_type.is_host_visible() {
            return Err(GpuAllocError::NotMappable);
        }
        let range = check_range(offset, data.len(), self.size())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: DeviceSize, out: &mut [u8]) -> Result<(), GpuAllocError> {
        if !self.memory_type.is_host_visible() {
            return Err(GpuAllocError::NotMappable);
        }
        let range = check_range(offset, out.len(), self.size())?;
        out.copy_from_slice(&self.data[range]);
        Ok(())
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        self.stats.allocated_bytes.sub(self.data.len() as u64);
    }
}

/// Host-memory allocator
///
/// Reports the alignments of [`DeviceLimits`] so that suballocation behaves
/// exactly as it would against a real device with the same limits.
#[derive(Debug)]
pub struct HostAllocator {
    limits: DeviceLimits,
    /// Upper bound on live bytes, `None` = unlimited
    memory_limit: Option<DeviceSize>,
    stats: Arc<HostStats>,
}

impl HostAllocator {
    /// Create an unlimited allocator with default device limits.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    /// Create an allocator emulating the given device limits.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            limits,
            memory_limit: None,
            stats: Arc::default(),
        }
    }

    /// Cap the number of live bytes; buffer creation beyond it fails with
    /// [`GpuAllocError::OutOfMemory`].
    pub fn with_memory_limit(mut self, limit: DeviceSize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuAllocator for HostAllocator {
    fn allocate_buffer(
        &self,
        size: DeviceSize,
        usage: BufferUsage,
        memory_type: MemoryType,
    ) -> Result<Box<dyn GpuBuffer>, GpuAllocError> {
        if size == 0 || usize::try_from(size).is_err() {
            self.stats.failed_allocations.increment();
            return Err(GpuAllocError::InvalidSize);
        }

        let live = self.stats.allocated_bytes.add(size);
        if let Some(limit) = self.memory_limit {
            if live > limit {
                let before = self.stats.allocated_bytes.sub(size);
                self.stats.failed_allocations.increment();
                return Err(GpuAllocError::OutOfMemory {
                    requested: size,
                    available: limit.saturating_sub(before),
                });
            }
        }
        self.stats.peak_usage.update_max(live);
        self.stats.allocation_count.increment();

        Ok(Box::new(HostBuffer {
            data: vec![0u8; size as usize],
            usage,
            memory_type,
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            stats: Arc::clone(&self.stats),
        }))
    }

    fn alignment_for(&self, usage: BufferUsage) -> Result<DeviceSize, GpuAllocError> {
        self.limits.alignment_for(usage)
    }

    fn stats(&self) -> GpuAllocStats {
        GpuAllocStats {
            allocation_count: self.stats.allocation_count.get(),
            failed_allocations: self.stats.failed_allocations.get(),
            allocated_bytes: self.stats.allocated_bytes.get(),
            peak_usage: self.stats.peak_usage.get(),
        }
    }
}
