//! Buffer regions - views into a slice of a block's backing buffer.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use super::block::BlockShared;
use crate::api::error::PoolError;
use crate::diagnostics::macros::bp_emit;
use crate::gpu::DeviceSize;

/// A writable byte range inside a block's backing buffer.
///
/// Regions never own memory. The back-reference to the block is weak, so a
/// region never keeps a block alive, and it captures the block generation:
/// once the block is reset (or dropped with its pool) every write through the
/// region fails with [`PoolError::StaleRegion`].
///
/// The default region is empty (size 0), the sentinel returned by
/// [`BufferBlock::try_allocate`](crate::BufferBlock::try_allocate) when a block is full.
#[derive(Debug, Clone, Default)]
pub struct BufferAllocation {
    block: Weak<BlockShared>,
    block_id: u64,
    generation: u64,
    offset: DeviceSize,
    size: DeviceSize,
}

impl BufferAllocation {
    pub(crate) fn new(
        block: &Arc<BlockShared>,
        block_id: u64,
        generation: u64,
        offset: DeviceSize,
        size: DeviceSize,
    ) -> Self {
        Self {
            block: Arc::downgrade(block),
            block_id,
            generation,
            offset,
            size,
        }
    }

    /// Whether this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Offset of the region inside the backing buffer.
    pub fn offset(&self) -> DeviceSize {
        self.offset
    }

    /// Requested size in bytes (alignment padding excluded).
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    /// Id of the block the region was carved from.
    pub fn block_id(&self) -> u64 {
        self.block_id
    }

    /// Block generation captured at allocation time.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether writes through this region are still allowed.
    pub fn is_live(&self) -> bool {
        !self.is_empty() && self.shared().is_some()
    }

    /// Raw handle of the backing buffer, for binding the region.
    pub fn buffer_handle(&self) -> Option<u64> {
        self.shared().map(|shared| shared.buffer.lock().raw_handle())
    }

    /// Copy `data` into the region at `local_offset`.
    pub fn update(&self, local_offset: DeviceSize, data: &[u8]) -> Result<(), PoolError> {
        let shared = self.checked(local_offset, data.len())?;
        let mut buffer = shared.buffer.lock();
        self.ensure_current(&shared)?;
        buffer.write(self.offset + local_offset, data)?;
        Ok(())
    }

    /// Copy a plain-old-data value into the region at `local_offset`.
    pub fn update_value<T: bytemuck::Pod>(
        &self,
        local_offset: DeviceSize,
        value: &T,
    ) -> Result<(), PoolError> {
        self.update(local_offset, bytemuck::bytes_of(value))
    }

    /// Copy a slice of plain-old-data values into the region at `local_offset`.
    pub fn update_slice<T: bytemuck::Pod>(
        &self,
        local_offset: DeviceSize,
        values: &[T],
    ) -> Result<(), PoolError> {
        self.update(local_offset, bytemuck::cast_slice(values))
    }

    /// Read back `out.len()` bytes from the region at `local_offset`.
    pub fn read(&self, local_offset: DeviceSize, out: &mut [u8]) -> Result<(), PoolError> {
        let shared = self.checked(local_offset, out.len())?;
        let buffer = shared.buffer.lock();
        self.ensure_current(&shared)?;
        buffer.read(self.offset + local_offset, out)?;
        Ok(())
    }

    /// Upgrade the back-reference if the block still carries this generation.
    fn shared(&self) -> Option<Arc<BlockShared>> {
        self.block
            .upgrade()
            .filter(|shared| shared.generation.load(Ordering::Acquire) == self.generation)
    }

    fn checked(&self, local_offset: DeviceSize, len: usize) -> Result<Arc<BlockShared>, PoolError> {
        if self.is_empty() {
            bp_emit!(BP003);
            return Err(PoolError::EmptyRegion);
        }

        let len = len as DeviceSize;
        if local_offset.checked_add(len).map_or(true, |end| end > self.size) {
            bp_emit!(
                BP002,
                "{} bytes at local offset {} into a {} byte region",
                len,
                local_offset,
                self.size
            );
            return Err(PoolError::RegionOverflow {
                offset: local_offset,
                len,
                size: self.size,
            });
        }

        self.block.upgrade().ok_or_else(|| self.stale())
    }

    /// Generation check, done while holding the buffer lock so a concurrent
    /// `reset()` cannot slip in between the check and the access.
    fn ensure_current(&self, shared: &BlockShared) -> Result<(), PoolError> {
        if shared.generation.load(Ordering::Acquire) == self.generation {
            Ok(())
        } else {
            Err(self.stale())
        }
    }

    fn stale(&self) -> PoolError {
        bp_emit!(
            BP001,
            "region of block #{} from generation {}",
            self.block_id,
            self.generation
        );
        PoolError::StaleRegion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::block::BufferBlock;
    use crate::gpu::{BufferUsage, GpuAllocError, HostAllocator, MemoryType};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Transform {
        position: [f32; 4],
        scale: [f32; 4],
    }

    fn block(memory_type: MemoryType) -> BufferBlock {
        BufferBlock::new(&HostAllocator::new(), 1024, BufferUsage::VERTEX_BUFFER, memory_type).unwrap()
    }

    #[test]
    fn test_update_and_read_back() {
        let mut block = block(MemoryType::HostVisible);
        block.allocate(16).unwrap();
        let region = block.allocate(8).unwrap();

        region.update(2, &[1, 2, 3]).unwrap();

        let mut out = [0u8; 8];
        region.read(0, &mut out).unwrap();
        assert_eq!(out, [0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_update_value() {
        let mut block = block(MemoryType::HostVisible);
        let region = block.allocate(std::mem::size_of::<Transform>() as DeviceSize).unwrap();
        let transform = Transform {
            position: [1.0, 2.0, 3.0, 1.0],
            scale: [0.5; 4],
        };

        region.update_value(0, &transform).unwrap();

        let mut out = Transform {
            position: [0.0; 4],
            scale: [0.0; 4],
        };
        region.read(0, bytemuck::bytes_of_mut(&mut out)).unwrap();
        assert_eq!(out, transform);
    }

    #[test]
    fn test_update_slice() {
        let mut block = block(MemoryType::HostVisible);
        let region = block.allocate(12).unwrap();
        region.update_slice(0, &[7u32, 8, 9]).unwrap();

        let mut out = [0u32; 3];
        region.read(0, bytemuck::cast_slice_mut(&mut out)).unwrap();
        assert_eq!(out, [7, 8, 9]);
    }

    #[test]
    fn test_overflowing_update() {
        let mut block = block(MemoryType::HostVisible);
        let region = block.allocate(8).unwrap();

        assert_eq!(
            region.update(4, &[0; 5]).unwrap_err(),
            PoolError::RegionOverflow { offset: 4, len: 5, size: 8 }
        );
        assert!(region.update(DeviceSize::MAX, &[0]).is_err());
        assert!(region.update(4, &[0; 4]).is_ok());
    }

    #[test]
    fn test_empty_region() {
        let region = BufferAllocation::default();
        assert!(region.is_empty());
        assert!(!region.is_live());
        assert_eq!(region.buffer_handle(), None);
        assert_eq!(region.update(0, &[1]).unwrap_err(), PoolError::EmptyRegion);
    }

    #[test]
    fn test_stale_after_reset() {
        let mut block = block(MemoryType::HostVisible);
        let region = block.allocate(8).unwrap();
        assert!(region.is_live());
        assert_eq!(region.buffer_handle(), Some(block.buffer_handle()));

        block.reset();
        assert!(!region.is_live());
        assert_eq!(region.update(0, &[1]).unwrap_err(), PoolError::StaleRegion);

        let fresh = block.allocate(8).unwrap();
        assert_eq!(fresh.offset(), region.offset());
        assert!(fresh.update(0, &[1]).is_ok());
    }

    #[test]
    fn test_stale_after_block_dropped() {
        let mut block = block(MemoryType::HostVisible);
        let region = block.allocate(8).unwrap();
        drop(block);

        assert!(!region.is_live());
        assert_eq!(region.update(0, &[1]).unwrap_err(), PoolError::StaleRegion);
    }

    #[test]
    fn test_device_local_not_writable() {
        let mut block = block(MemoryType::DeviceLocal);
        let region = block.allocate(8).unwrap();
        assert_eq!(
            region.update(0, &[1]).unwrap_err(),
            PoolError::Allocation(GpuAllocError::NotMappable)
        );
    }
}
