//! Buffer block - bump allocator over one backing buffer.
//!
//! This is the hot path for per-frame buffer data.
//! No locks on allocation - just offset bumping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::region::BufferAllocation;
use crate::api::error::PoolError;
#[cfg(feature = "debug")]
use crate::diagnostics::macros::bp_log;
use crate::gpu::{BufferUsage, DeviceSize, GpuAllocError, GpuAllocator, GpuBuffer, MemoryType};
use crate::sync::mutex::Mutex;
use crate::util::layout::{align_up, is_aligned};

static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(0);

/// Query the backend alignment for `usage`, rejecting zero.
pub(crate) fn checked_alignment(allocator: &dyn GpuAllocator, usage: BufferUsage) -> Result<DeviceSize, PoolError> {
    match allocator.alignment_for(usage)? {
        0 => Err(GpuAllocError::AlignmentFailed.into()),
        alignment => Ok(alignment),
    }
}

/// State shared between a block and the regions carved from it.
///
/// Only the block holds a strong reference. The generation only changes
/// while the buffer lock is held.
pub(crate) struct BlockShared {
    pub(crate) buffer: Mutex<Box<dyn GpuBuffer>>,
    pub(crate) generation: AtomicU64,
}

/// A backing buffer handing out non-overlapping regions by bumping an offset.
///
/// Each allocation is rounded up to the block's alignment, so every region
/// starts on an aligned offset. Padding is never reclaimed until `reset()`.
pub struct BufferBlock {
    shared: Arc<BlockShared>,

    id: u64,

    /// Capacity of the backing buffer
    size: DeviceSize,

    usage: BufferUsage,

    /// Memory alignment, it may change according to the usage
    alignment: DeviceSize,

    /// Current offset, it increases on every allocation
    offset: DeviceSize,

    /// Regions handed out since the last reset
    allocation_count: u32,
}

impl BufferBlock {
    /// Create a block of `size` bytes through `allocator`.
    ///
    /// The alignment is the one the backend reports for `usage`.
    pub fn new(
        allocator: &dyn GpuAllocator,
        size: DeviceSize,
        usage: BufferUsage,
        memory_type: MemoryType,
    ) -> Result<Self, PoolError> {
        let alignment = checked_alignment(allocator, usage)?;
        let buffer = allocator.allocate_buffer(size, usage, memory_type)?;
        Ok(Self::from_buffer(buffer, alignment))
    }

    /// Wrap an existing backing buffer.
    pub(crate) fn from_buffer(buffer: Box<dyn GpuBuffer>, alignment: DeviceSize) -> Self {
        debug_assert!(alignment > 0, "block alignment must be non-zero");
        let size = buffer.size();
        let usage = buffer.usage();
        Self {
            shared: Arc::new(BlockShared {
                buffer: Mutex::new(buffer),
                generation: AtomicU64::new(0),
            }),
            id: NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed),
            size,
            usage,
            alignment,
            offset: 0,
            allocation_count: 0,
        }
    }

    /// Carve a region of `size` bytes.
    ///
    /// Fails with [`PoolError::CapacityExceeded`] when `size` rounded up to
    /// the alignment does not fit in the remaining room; the block is left
    /// unchanged and the caller should retry on a block from the pool.
    pub fn allocate(&mut self, size: DeviceSize) -> Result<BufferAllocation, PoolError> {
        if size == 0 {
            return Err(PoolError::ZeroSize);
        }

        let aligned = align_up(size, self.alignment).ok_or(PoolError::SizeOverflow(size))?;
        let remaining = self.remaining();
        if aligned > remaining {
            return Err(PoolError::CapacityExceeded {
                requested: size,
                aligned,
                remaining,
            });
        }

        let region = BufferAllocation::new(&self.shared, self.id, self.generation(), self.offset, size);
        self.offset += aligned;
        self.allocation_count += 1;

        debug_assert!(is_aligned(region.offset(), self.alignment));
        debug_assert!(self.offset <= self.size);
        Ok(region)
    }

    /// Like [`allocate`](Self::allocate), but returns the empty region on failure.
    ///
    /// For callers that probe for room and tolerate getting none.
    pub fn try_allocate(&mut self, size: DeviceSize) -> BufferAllocation {
        self.allocate(size).unwrap_or_default()
    }

    /// Whether an allocation of `size` bytes would succeed.
    pub fn can_allocate(&self, size: DeviceSize) -> bool {
        size > 0 && align_up(size, self.alignment).map_or(false, |aligned| aligned <= self.remaining())
    }

    /// Forget every region handed out so far.
    ///
    /// The memory is not cleared. Regions allocated before the reset become
    /// stale. Resetting an untouched block is a no-op.
    pub fn reset(&mut self) {
        if self.offset == 0 {
            return;
        }

        #[allow(unused_mut)]
        let mut buffer = self.shared.buffer.lock();

        #[cfg(feature = "debug")]
        self.poison(&mut **buffer);

        // regions re-check the generation under this lock before writing
        self.shared.generation.fetch_add(1, Ordering::Release);
        drop(buffer);

        self.offset = 0;
        self.allocation_count = 0;
    }

    /// Fill the bytes used since the last reset with `0xCD`.
    #[cfg(feature = "debug")]
    fn poison(&self, buffer: &mut dyn GpuBuffer) {
        // device-local memory cannot be poisoned from the host
        if !buffer.memory_type().is_host_visible() {
            return;
        }
        let result = usize::try_from(self.offset)
            .map_err(|_| GpuAllocError::InvalidSize)
            .and_then(|len| buffer.write(0, &vec![0xCD; len]));
        if let Err(err) = result {
            bp_log!(warn, "Could not poison buffer block #{}: {}", self.id, err);
        }
    }

    /// Unique id of this block.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Total capacity of the backing buffer.
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    /// Current bump offset.
    pub fn offset(&self) -> DeviceSize {
        self.offset
    }

    /// Bytes left before the block is full.
    pub fn remaining(&self) -> DeviceSize {
        self.size - self.offset
    }

    pub fn alignment(&self) -> DeviceSize {
        self.alignment
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Number of resets that invalidated regions.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Regions handed out since the last reset.
    pub fn allocation_count(&self) -> u32 {
        self.allocation_count
    }

    /// Raw handle of the backing buffer.
    pub fn buffer_handle(&self) -> u64 {
        self.shared.buffer.lock().raw_handle()
    }
}

impl std::fmt::Debug for BufferBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferBlock")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("alignment", &self.alignment)
            .field("offset", &self.offset)
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{DeviceLimits, HostAllocator};

    fn block(size: DeviceSize, alignment: DeviceSize) -> BufferBlock {
        let allocator = HostAllocator::with_limits(DeviceLimits {
            min_uniform_buffer_offset_alignment: alignment,
            ..DeviceLimits::default()
        });
        BufferBlock::new(&allocator, size, BufferUsage::UNIFORM_BUFFER, MemoryType::HostVisible).unwrap()
    }

    #[test]
    fn test_basic_allocation() {
        let mut block = block(4096, 16);

        let a = block.allocate(64).unwrap();
        let b = block.allocate(50).unwrap();

        assert_eq!((a.offset(), a.size()), (0, 64));
        assert_eq!((b.offset(), b.size()), (64, 50));
        assert_eq!(block.offset(), 128);
        assert_eq!(block.allocation_count(), 2);
    }

    #[test]
    fn test_regions_never_overlap() {
        let mut block = block(8192, 256);
        let sizes = [1, 255, 256, 257, 3, 700, 64, 1024, 17];

        let regions: Vec<_> = sizes.iter().map(|&s| block.allocate(s).unwrap()).collect();

        for (i, a) in regions.iter().enumerate() {
            assert_eq!(a.offset() % 256, 0);
            assert!(a.offset() + a.size() <= block.size());
            for b in &regions[i + 1..] {
                let disjoint = a.offset() + a.size() <= b.offset() || b.offset() + b.size() <= a.offset();
                assert!(disjoint, "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_exact_remaining_fits() {
        let mut block = block(1024, 16);
        block.allocate(512).unwrap();

        let remaining = block.remaining();
        assert!(!block.can_allocate(remaining + 1));
        assert!(matches!(
            block.allocate(remaining + 1),
            Err(PoolError::CapacityExceeded { requested: 513, aligned: 528, remaining: 512 })
        ));
        assert_eq!(block.offset(), 512);

        let last = block.allocate(remaining).unwrap();
        assert_eq!(last.offset(), 512);
        assert_eq!(block.remaining(), 0);
    }

    #[test]
    fn test_aligned_size_must_fit() {
        // 100 unaligned bytes fit, but 112 aligned bytes do not
        let mut block = block(100, 16);
        assert!(block.allocate(100).unwrap_err().is_capacity_exceeded());
        assert!(block.allocate(96).is_ok());
    }

    #[test]
    fn test_try_allocate_returns_empty_when_full() {
        let mut block = block(64, 16);
        assert!(!block.try_allocate(64).is_empty());
        assert!(block.try_allocate(1).is_empty());
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut block = block(64, 16);
        assert_eq!(block.allocate(0).unwrap_err(), PoolError::ZeroSize);
        assert!(!block.can_allocate(0));
    }

    #[test]
    fn test_reset() {
        let mut block = block(1024, 16);
        block.allocate(1000).unwrap();
        assert_eq!(block.generation(), 0);

        block.reset();
        assert_eq!(block.offset(), 0);
        assert_eq!(block.generation(), 1);

        // New allocation should reuse the same memory
        let region = block.allocate(1024).unwrap();
        assert_eq!(region.offset(), 0);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut block = block(1024, 16);
        block.reset();
        block.reset();
        assert_eq!(block.generation(), 0);

        block.allocate(16).unwrap();
        block.reset();
        block.reset();
        assert_eq!(block.generation(), 1);
        assert_eq!(block.offset(), 0);
    }

    #[cfg(feature = "debug")]
    #[test]
    fn test_reset_poisons_used_bytes() {
        let mut block = block(1024, 16);
        let region = block.allocate(32).unwrap();
        region.update(0, &[0x11; 32]).unwrap();

        block.reset();

        let fresh = block.allocate(48).unwrap();
        let mut out = [0u8; 48];
        fresh.read(0, &mut out).unwrap();
        // bytes past the old offset were never handed out
        assert_eq!(out[..32], [0xCD; 32]);
        assert_eq!(out[32..], [0; 16]);
    }

    #[test]
    fn test_stale_writer_never_lands_after_reset() {
        let mut block = block(1024, 16);
        let stale = block.allocate(16).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..500 {
                    let _ = stale.update(0, &[0x11; 16]);
                }
            });

            for _ in 0..200 {
                block.reset();
                let fresh = block.allocate(16).unwrap();
                fresh.update(0, &[0xAA; 16]).unwrap();

                let mut out = [0u8; 16];
                fresh.read(0, &mut out).unwrap();
                assert_eq!(out, [0xAA; 16]);
            }
        });
    }

    #[test]
    fn test_non_power_of_two_alignment() {
        let mut block = block(120, 24);
        assert_eq!(block.allocate(10).unwrap().offset(), 0);
        assert_eq!(block.allocate(30).unwrap().offset(), 24);
        assert_eq!(block.allocate(1).unwrap().offset(), 72);
    }

    struct ZeroAlignment;

    impl GpuAllocator for ZeroAlignment {
        fn allocate_buffer(
            &self,
            size: DeviceSize,
            usage: BufferUsage,
            memory_type: MemoryType,
        ) -> Result<Box<dyn GpuBuffer>, GpuAllocError> {
            HostAllocator::new().allocate_buffer(size, usage, memory_type)
        }

        fn alignment_for(&self, _usage: BufferUsage) -> Result<DeviceSize, GpuAllocError> {
            Ok(0)
        }

        fn stats(&self) -> crate::gpu::GpuAllocStats {
            crate::gpu::GpuAllocStats::default()
        }
    }

    #[test]
    fn test_zero_alignment_rejected() {
        let err = BufferBlock::new(&ZeroAlignment, 64, BufferUsage::VERTEX_BUFFER, MemoryType::HostVisible).unwrap_err();
        assert_eq!(err, PoolError::Allocation(GpuAllocError::AlignmentFailed));
    }

    #[test]
    fn test_unsupported_usage() {
        let allocator = HostAllocator::new();
        let err = BufferBlock::new(&allocator, 64, BufferUsage::empty(), MemoryType::HostVisible).unwrap_err();
        assert!(matches!(err, PoolError::Allocation(_)));
    }
}
