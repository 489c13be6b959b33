//! Vulkan allocator implementation

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{
    AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;

use super::super::traits::{
    BufferUsage, DeviceLimits, DeviceSize, GpuAllocError, GpuAllocStats, GpuAllocator,
    GpuBuffer, MemoryType,
};
use super::buffer::{VulkanBuffer, VulkanStats};
use super::map_allocation_error;
use crate::sync::mutex::Mutex;

/// Vulkan-based backing-buffer allocator
pub struct VulkanAllocator {
    /// Vulkan device
    device: ash::Device,
    /// Memory suballocator shared with every live buffer
    allocator: Arc<Mutex<Allocator>>,
    /// Offset alignments queried from the physical device
    limits: DeviceLimits,
    stats: Arc<VulkanStats>,
}

impl VulkanAllocator {
    /// Create a new Vulkan allocator
    pub fn new(
        instance: &ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self, GpuAllocError> {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let limits = DeviceLimits {
            min_uniform_buffer_offset_alignment: properties.limits.min_uniform_buffer_offset_alignment,
            min_storage_buffer_offset_alignment: properties.limits.min_storage_buffer_offset_alignment,
            min_texel_buffer_offset_alignment: properties.limits.min_texel_buffer_offset_alignment,
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| map_allocation_error(e, 0))?;

        Ok(Self {
            device,
            allocator: Arc::new(Mutex::new(allocator)),
            limits,
            stats: Arc::default(),
        })
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }
}

fn memory_location(memory_type: MemoryType) -> MemoryLocation {
    match memory_type {
        MemoryType::DeviceLocal => MemoryLocation::GpuOnly,
        MemoryType::HostVisible | MemoryType::HostCoherent => MemoryLocation::CpuToGpu,
        MemoryType::HostCached => MemoryLocation::GpuToCpu,
    }
}

impl GpuAllocator for VulkanAllocator {
    fn allocate_buffer(
        &self,
        size: DeviceSize,
        usage: BufferUsage,
        memory_type: MemoryType,
    ) -> Result<Box<dyn GpuBuffer>, GpuAllocError> {
        if size == 0 {
            self.stats.failed_allocations.increment();
            return Err(GpuAllocError::InvalidSize);
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::from_raw(usage.bits))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let vk_buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            self.stats.failed_allocations.increment();
            GpuAllocError::BackendError(format!("vkCreateBuffer failed: {}", e))
        })?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(vk_buffer) };

        let allocation = self.allocator.lock().allocate(&AllocationCreateDesc {
            name: "framepool block",
            requirements,
            location: memory_location(memory_type),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(vk_buffer, None) };
                self.stats.failed_allocations.increment();
                return Err(map_allocation_error(e, size));
            }
        };

        let bound = unsafe {
            self.device
                .bind_buffer_memory(vk_buffer, allocation.memory(), allocation.offset())
        };
        if bound.is_err() {
            // the allocation goes back to the suballocator before the buffer dies
            let _ = self.allocator.lock().free(allocation);
            unsafe { self.device.destroy_buffer(vk_buffer, None) };
            self.stats.failed_allocations.increment();
            return Err(GpuAllocError::AlignmentFailed);
        }

        let live = self.stats.allocated_bytes.add(size);
        self.stats.peak_usage.update_max(live);
        self.stats.allocation_count.increment();

        Ok(Box::new(VulkanBuffer::new(
            self.device.clone(),
            Arc::clone(&self.allocator),
            vk_buffer,
            allocation,
            size,
            usage,
            memory_type,
            Arc::clone(&self.stats),
        )))
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
