//! Vulkan buffer implementation

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, Allocator};

use super::super::traits::{check_range, BufferUsage, DeviceSize, GpuAllocError, GpuBuffer, MemoryType};
use crate::sync::atomics::{AtomicCounter, AtomicGauge};
use crate::sync::mutex::Mutex;

#[derive(Debug, Default)]
pub(crate) struct VulkanStats {
    pub allocation_count: AtomicCounter,
    pub failed_allocations: AtomicCounter,
    pub allocated_bytes: AtomicGauge,
    pub peak_usage: AtomicGauge,
}

/// Vulkan-backed buffer
pub struct VulkanBuffer {
    /// Raw Vulkan buffer handle
    pub vk_buffer: vk::Buffer,
    /// Memory bound to the buffer; `None` only during drop
    allocation: Option<Allocation>,
    size: DeviceSize,
    usage: BufferUsage,
    memory_type: MemoryType,
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
    stats: Arc<VulkanStats>,
}

impl VulkanBuffer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        vk_buffer: vk::Buffer,
        allocation: Allocation,
        size: DeviceSize,
        usage: BufferUsage,
        memory_type: MemoryType,
        stats: Arc<VulkanStats>,
    ) -> Self {
        Self {
            vk_buffer,
            allocation: Some(allocation),
            size,
            usage,
            memory_type,
            device,
            allocator,
            stats,
        }
    }
}

impl GpuBuffer for VulkanBuffer {
    fn size(&self) -> DeviceSize {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    fn raw_handle(&self) -> u64 {
        self.vk_buffer.as_raw()
    }

    fn write(&mut self, offset: DeviceSize, data: &[u8]) -> Result<(), GpuAllocError> {
        let range = check_range(offset, data.len(), self.size)?;
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or(GpuAllocError::NotMappable)?;
        mapped[range].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: DeviceSize, out: &mut [u8]) -> Result<(), GpuAllocError> {
        let range = check_range(offset, out.len(), self.size)?;
        let mapped = self
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_slice())
            .ok_or(GpuAllocError::NotMappable)?;
        out.copy_from_slice(&mapped[range]);
        Ok(())
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            let _ = self.allocator.lock().free(allocation);
        }
        unsafe {
            self.device.destroy_buffer(self.vk_buffer, None);
        }
        self.stats.allocated_bytes.sub(self.size);
    }
}
