//! Frame buffers - per-frame pools grouped by usage and recording thread.
//!
//! A [`FrameBuffers`] owns every pool one frame writes into. A [`FrameRing`]
//! cycles through several of them so the CPU can record frame N+1 while the
//! GPU still reads frame N.

use std::collections::HashMap;
use std::sync::Arc;

use crate::allocators::pool::BufferPool;
use crate::allocators::region::BufferAllocation;
use crate::api::config::FrameBuffersConfig;
use crate::api::error::PoolError;
use crate::api::stats::PoolStats;
use crate::diagnostics::macros::{bp_emit, bp_log};
use crate::gpu::{BufferUsage, DeviceSize, GpuAllocator};

/// The buffer pools one recording thread writes into during a frame.
///
/// One pool per supported usage. Pools are built up front but hold no
/// backing memory until their first request.
pub struct ThreadBuffers {
    pools: HashMap<BufferUsage, BufferPool>,
    index: usize,
}

impl ThreadBuffers {
    fn new(allocator: &Arc<dyn GpuAllocator>, config: &FrameBuffersConfig, index: usize) -> Result<Self, PoolError> {
        let mut pools = HashMap::with_capacity(config.usages.len());
        for &(usage, multiplier) in &config.usages {
            let pool = BufferPool::with_config(allocator.clone(), config.pool_config(usage, multiplier))?;
            pools.insert(usage, pool);
        }
        Ok(Self { pools, index })
    }

    /// Carve `size` bytes for `usage`.
    ///
    /// Tries the current block of the usage's pool first. When it is full
    /// (or the pool has none yet) a block with fresh room is requested and
    /// the allocation retried once.
    pub fn allocate_buffer(&mut self, usage: BufferUsage, size: DeviceSize) -> Result<BufferAllocation, PoolError> {
        let pool = self.pool_mut(usage)?;
        if size == 0 {
            return Err(PoolError::ZeroSize);
        }

        if let Some(block) = pool.current_block_mut() {
            match block.allocate(size) {
                Err(err) if err.is_capacity_exceeded() => {}
                result => return result,
            }
        }
        pool.request_buffer_block(size)?.allocate(size)
    }

    /// Reset the pool of every usage.
    pub fn reset(&mut self) {
        for pool in self.pools.values_mut() {
            pool.reset();
        }
    }

    pub fn pool(&self, usage: BufferUsage) -> Result<&BufferPool, PoolError> {
        self.pools.get(&usage).ok_or_else(|| unsupported(usage))
    }

    pub fn pool_mut(&mut self, usage: BufferUsage) -> Result<&mut BufferPool, PoolError> {
        self.pools.get_mut(&usage).ok_or_else(|| unsupported(usage))
    }

    /// Thread slot of these pools inside their frame.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Supported usages, ordered by flag bits.
    pub fn usages(&self) -> Vec<BufferUsage> {
        let mut usages: Vec<_> = self.pools.keys().copied().collect();
        usages.sort_by_key(|usage| usage.bits);
        usages
    }

    /// Stats of every pool, ordered by usage.
    pub fn stats(&self) -> Vec<PoolStats> {
        self.usages().into_iter().map(|usage| self.pools[&usage].stats()).collect()
    }
}

fn unsupported(usage: BufferUsage) -> PoolError {
    bp_emit!(BP101, "{:?}", usage);
    PoolError::UnsupportedUsage(usage)
}

impl std::fmt::Debug for ThreadBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadBuffers")
            .field("index", &self.index)
            .field("usages", &self.usages())
            .finish()
    }
}

/// The buffer pools of one frame, one [`ThreadBuffers`] per recording thread.
///
/// Threads never share a pool. Hand each worker its own slot through
/// [`threads_mut`](Self::threads_mut) to record in parallel, then reset
/// the whole frame once the GPU is done with it.
#[derive(Debug)]
pub struct FrameBuffers {
    threads: Vec<ThreadBuffers>,
}

impl FrameBuffers {
    /// Create the pools described by `config`.
    pub fn new(allocator: Arc<dyn GpuAllocator>, config: &FrameBuffersConfig) -> Result<Self, PoolError> {
        let threads = (0..config.thread_count.max(1))
            .map(|index| ThreadBuffers::new(&allocator, config, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { threads })
    }

    /// Carve `size` bytes for `usage` from the pools of `thread_index`.
    ///
    /// See [`ThreadBuffers::allocate_buffer`].
    pub fn allocate_buffer(
        &mut self,
        usage: BufferUsage,
        size: DeviceSize,
        thread_index: usize,
    ) -> Result<BufferAllocation, PoolError> {
        self.thread_mut(thread_index)?.allocate_buffer(usage, size)
    }

    /// Reset every pool of every thread.
    pub fn reset(&mut self) {
        for thread in &mut self.threads {
            thread.reset();
        }
    }

    pub fn thread(&self, thread_index: usize) -> Result<&ThreadBuffers, PoolError> {
        let count = self.threads.len();
        self.threads
            .get(thread_index)
            .ok_or(PoolError::InvalidThread { index: thread_index, count })
    }

    pub fn thread_mut(&mut self, thread_index: usize) -> Result<&mut ThreadBuffers, PoolError> {
        let count = self.threads.len();
        self.threads
            .get_mut(thread_index)
            .ok_or(PoolError::InvalidThread { index: thread_index, count })
    }

    /// Disjoint mutable access to every thread slot, in slot order.
    pub fn threads_mut(&mut self) -> std::slice::IterMut<'_, ThreadBuffers> {
        self.threads.iter_mut()
    }

    /// The pool serving `usage` on `thread_index`.
    pub fn pool(&self, usage: BufferUsage, thread_index: usize) -> Result<&BufferPool, PoolError> {
        self.thread(thread_index)?.pool(usage)
    }

    pub fn pool_mut(&mut self, usage: BufferUsage, thread_index: usize) -> Result<&mut BufferPool, PoolError> {
        self.thread_mut(thread_index)?.pool_mut(usage)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Supported usages, ordered by flag bits.
    pub fn usages(&self) -> Vec<BufferUsage> {
        self.threads[0].usages()
    }

    /// Stats of every pool, ordered by usage then thread.
    pub fn stats(&self) -> Vec<PoolStats> {
        self.usages()
            .into_iter()
            .flat_map(|usage| self.threads.iter().map(move |thread| thread.pools[&usage].stats()))
            .collect()
    }
}

/// Frame buffers for every frame in flight.
#[derive(Debug)]
pub struct FrameRing {
    frames: Vec<FrameBuffers>,
    current: usize,
    frame_number: u64,
}

impl FrameRing {
    /// Create `frames_in_flight` frames (at least one) sharing one allocator.
    pub fn new(
        allocator: Arc<dyn GpuAllocator>,
        config: &FrameBuffersConfig,
        frames_in_flight: usize,
    ) -> Result<Self, PoolError> {
        let frames = (0..frames_in_flight.max(1))
            .map(|_| FrameBuffers::new(allocator.clone(), config))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            frames,
            current: 0,
            frame_number: 0,
        })
    }

    /// Move to the next frame slot and reset it.
    ///
    /// The caller must have waited for the GPU to finish the frame that last
    /// used the slot.
    pub fn begin_frame(&mut self) -> &mut FrameBuffers {
        self.current = (self.frame_number % self.frames.len() as u64) as usize;
        self.frame_number += 1;
        bp_log!(trace, "Begin frame {} in slot {}", self.frame_number, self.current);

        let frame = &mut self.frames[self.current];
        frame.reset();
        frame
    }

    pub fn current(&self) -> &FrameBuffers {
        &self.frames[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameBuffers {
        &mut self.frames[self.current]
    }

    /// Slot of the current frame.
    pub fn frame_index(&self) -> usize {
        self.current
    }

    /// Number of frames begun so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HostAllocator;
    use crate::util::size::kb;

    fn frame(config: &FrameBuffersConfig) -> FrameBuffers {
        FrameBuffers::new(Arc::new(HostAllocator::new()), config).unwrap()
    }

    #[test]
    fn test_lazy_pools() {
        let frame = frame(&FrameBuffersConfig::minimal().with_thread_count(2));
        assert_eq!(frame.usages().len(), 4);
        assert_eq!(frame.stats().len(), 8);
        assert!(frame.stats().iter().all(|stats| stats.block_count == 0));
    }

    #[test]
    fn test_usage_multiplier() {
        let mut frame = frame(&FrameBuffersConfig::minimal());
        frame.allocate_buffer(BufferUsage::STORAGE_BUFFER, 16, 0).unwrap();

        let pool = frame.pool(BufferUsage::STORAGE_BUFFER, 0).unwrap();
        assert_eq!(pool.blocks()[0].size(), kb(32));
    }

    #[test]
    fn test_allocations_pack_into_current_block() {
        let mut frame = frame(&FrameBuffersConfig::minimal());
        let a = frame.allocate_buffer(BufferUsage::UNIFORM_BUFFER, 64, 0).unwrap();
        let b = frame.allocate_buffer(BufferUsage::UNIFORM_BUFFER, 64, 0).unwrap();

        assert_eq!(a.block_id(), b.block_id());
        assert_eq!(b.offset(), 256);
    }

    #[test]
    fn test_full_block_retries_on_fresh_block() {
        let config = FrameBuffersConfig::minimal().with_block_size(1024);
        let mut frame = frame(&config);

        let a = frame.allocate_buffer(BufferUsage::VERTEX_BUFFER, 1000, 0).unwrap();
        let b = frame.allocate_buffer(BufferUsage::VERTEX_BUFFER, 1000, 0).unwrap();
        assert_ne!(a.block_id(), b.block_id());
        assert_eq!(b.offset(), 0);

        let big = frame.allocate_buffer(BufferUsage::VERTEX_BUFFER, 5000, 0).unwrap();
        assert_eq!(big.size(), 5000);
        assert_eq!(frame.pool(BufferUsage::VERTEX_BUFFER, 0).unwrap().active_count(), 3);
    }

    #[test]
    fn test_threads_get_separate_pools() {
        let mut frame = frame(&FrameBuffersConfig::minimal().with_thread_count(2));
        let a = frame.allocate_buffer(BufferUsage::INDEX_BUFFER, 32, 0).unwrap();
        let b = frame.allocate_buffer(BufferUsage::INDEX_BUFFER, 32, 1).unwrap();

        assert_ne!(a.block_id(), b.block_id());
        assert_eq!((a.offset(), b.offset()), (0, 0));
    }

    #[test]
    fn test_threads_record_in_parallel() {
        let mut frame = frame(&FrameBuffersConfig::minimal().with_thread_count(2));

        let regions: Vec<Vec<BufferAllocation>> = std::thread::scope(|scope| {
            let workers: Vec<_> = frame
                .threads_mut()
                .map(|thread| {
                    scope.spawn(move || {
                        (0..32u8)
                            .map(|i| {
                                let region = thread.allocate_buffer(BufferUsage::VERTEX_BUFFER, 64).unwrap();
                                region.update(0, &[thread.index() as u8 * 100 + i; 64]).unwrap();
                                region
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });

        for (thread_index, regions) in regions.iter().enumerate() {
            let pool = frame.pool(BufferUsage::VERTEX_BUFFER, thread_index).unwrap();
            assert_eq!(pool.block_count(), 1);
            for (i, region) in regions.iter().enumerate() {
                assert_eq!(region.block_id(), pool.blocks()[0].id());
                let mut out = [0u8; 64];
                region.read(0, &mut out).unwrap();
                assert_eq!(out, [thread_index as u8 * 100 + i as u8; 64]);
            }
        }

        frame.reset();
        assert!(regions.iter().flatten().all(|region| !region.is_live()));
    }

    #[test]
    fn test_invalid_requests() {
        let mut frame = frame(&FrameBuffersConfig::minimal());

        assert_eq!(
            frame.allocate_buffer(BufferUsage::INDIRECT_BUFFER, 16, 0).unwrap_err(),
            PoolError::UnsupportedUsage(BufferUsage::INDIRECT_BUFFER)
        );
        assert_eq!(
            frame.allocate_buffer(BufferUsage::UNIFORM_BUFFER, 16, 3).unwrap_err(),
            PoolError::InvalidThread { index: 3, count: 1 }
        );
        assert_eq!(
            frame.allocate_buffer(BufferUsage::UNIFORM_BUFFER, 0, 0).unwrap_err(),
            PoolError::ZeroSize
        );
    }

    #[test]
    fn test_ring_cycles_slots() {
        let mut ring = FrameRing::new(Arc::new(HostAllocator::new()), &FrameBuffersConfig::minimal(), 2).unwrap();
        assert_eq!(ring.frames_in_flight(), 2);

        ring.begin_frame();
        assert_eq!(ring.frame_index(), 0);
        let first = ring
            .current_mut()
            .allocate_buffer(BufferUsage::UNIFORM_BUFFER, 64, 0)
            .unwrap();

        ring.begin_frame();
        assert_eq!(ring.frame_index(), 1);
        // the previous slot is untouched while it may still be in flight
        assert!(first.is_live());

        ring.begin_frame();
        assert_eq!(ring.frame_index(), 0);
        assert_eq!(ring.frame_number(), 3);
        assert!(!first.is_live());
    }
}
