//! Buffer pool - recycles blocks of one usage across frames.

use std::sync::Arc;

use super::block::{checked_alignment, BufferBlock};
use crate::api::config::{PoolConfig, PromotionPolicy};
use crate::api::error::PoolError;
use crate::api::stats::PoolStats;
use crate::diagnostics::macros::{bp_emit, bp_log};
use crate::gpu::{BufferUsage, DeviceSize, GpuAllocator, MemoryType};
use crate::util::layout::align_up;
use crate::util::size::format_bytes;

/// A pool of buffer blocks for a specific usage.
///
/// Blocks live in one sequence split into an active prefix
/// (`..active_count`, may hold regions handed out this frame) and an inactive
/// suffix (empty, ready to be recycled). Blocks are never released before the
/// pool is dropped; `reset()` only moves the split back to zero.
///
/// A pool is driven by one thread; give each recording thread its own pool.
pub struct BufferPool {
    allocator: Arc<dyn GpuAllocator>,

    /// List of blocks requested
    blocks: Vec<BufferBlock>,

    /// Minimum size of the blocks
    block_size: DeviceSize,

    usage: BufferUsage,

    memory_type: MemoryType,

    policy: PromotionPolicy,

    /// Offset alignment of every block, queried once
    alignment: DeviceSize,

    /// Number of active blocks from the start of `blocks`
    active_count: usize,

    blocks_created: u64,
    promotions: u64,
    resets: u64,
}

impl BufferPool {
    /// Create a pool of host-visible blocks of at least `block_size` bytes.
    pub fn new(
        allocator: Arc<dyn GpuAllocator>,
        block_size: DeviceSize,
        usage: BufferUsage,
    ) -> Result<Self, PoolError> {
        Self::with_config(allocator, PoolConfig::new(block_size, usage))
    }

    /// Create a pool from a full config.
    ///
    /// Fails when the backend has no usable alignment rule for the usage, or
    /// when the block size is zero. No backing memory is allocated yet.
    pub fn with_config(allocator: Arc<dyn GpuAllocator>, config: PoolConfig) -> Result<Self, PoolError> {
        if config.block_size == 0 {
            return Err(PoolError::ZeroSize);
        }
        let alignment = checked_alignment(allocator.as_ref(), config.usage)?;

        Ok(Self {
            allocator,
            blocks: Vec::new(),
            block_size: config.block_size,
            usage: config.usage,
            memory_type: config.memory_type,
            policy: config.policy,
            alignment,
            active_count: 0,
            blocks_created: 0,
            promotions: 0,
            resets: 0,
        })
    }

    /// Get a block with fresh room for at least `minimum_size` bytes.
    ///
    /// Recycles the first fitting inactive block (see [`PromotionPolicy`])
    /// or constructs one of `max(minimum_size, block_size)` bytes, with
    /// `minimum_size` rounded up to the alignment. Either way the block
    /// becomes the tail of the active prefix.
    ///
    /// `minimum_size == 0` asks for any block: the tail active block if there
    /// is one, else the first inactive block. Only an empty pool constructs.
    pub fn request_buffer_block(&mut self, minimum_size: DeviceSize) -> Result<&mut BufferBlock, PoolError> {
        if minimum_size == 0 {
            if self.active_count > 0 {
                return Ok(&mut self.blocks[self.active_count - 1]);
            }
            if !self.blocks.is_empty() {
                return Ok(self.promote(0));
            }
            return self.create_block(self.block_size);
        }

        let required = align_up(minimum_size, self.alignment).ok_or(PoolError::SizeOverflow(minimum_size))?;

        match self.find_inactive(required) {
            Some(index) => Ok(self.promote(index)),
            None => self.create_block(required.max(self.block_size)),
        }
    }

    /// Get the tail active block if it still has room for `minimum_size`
    /// bytes, otherwise a block from [`request_buffer_block`](Self::request_buffer_block).
    ///
    /// Keeps a frame's data packed into as few blocks as possible.
    pub fn acquire_block(&mut self, minimum_size: DeviceSize) -> Result<&mut BufferBlock, PoolError> {
        if minimum_size > 0 && self.current_block().map_or(false, |b| b.can_allocate(minimum_size)) {
            let tail = self.active_count - 1;
            return Ok(&mut self.blocks[tail]);
        }
        self.request_buffer_block(minimum_size)
    }

    /// The most recently requested block of this frame.
    pub fn current_block(&self) -> Option<&BufferBlock> {
        self.active_count.checked_sub(1).map(|tail| &self.blocks[tail])
    }

    /// Mutable access to the most recently requested block of this frame.
    pub fn current_block_mut(&mut self) -> Option<&mut BufferBlock> {
        match self.active_count {
            0 => None,
            active => Some(&mut self.blocks[active - 1]),
        }
    }

    /// Turn every active block back into an empty inactive one.
    ///
    /// Block order is preserved. The caller guarantees the GPU is done with
    /// every region handed out since the previous reset.
    pub fn reset(&mut self) {
        for block in &mut self.blocks[..self.active_count] {
            block.reset();
        }
        bp_log!(
            trace,
            "Reset {:?} pool: {} active of {} blocks",
            self.usage,
            self.active_count,
            self.blocks.len()
        );
        self.active_count = 0;
        self.resets += 1;
    }

    /// Index of the inactive block to promote for `required` bytes.
    fn find_inactive(&self, required: DeviceSize) -> Option<usize> {
        let mut fitting = self.blocks[self.active_count..]
            .iter()
            .enumerate()
            .filter(|(_, block)| block.size() >= required);

        let found = match self.policy {
            PromotionPolicy::FirstFit => fitting.next(),
            PromotionPolicy::BestFit => fitting.min_by_key(|(i, block)| (block.size(), *i)),
        };
        found.map(|(i, _)| self.active_count + i)
    }

    /// Move the inactive block at `index` to the end of the active prefix.
    fn promote(&mut self, index: usize) -> &mut BufferBlock {
        debug_assert!(index >= self.active_count);
        self.blocks.swap(self.active_count, index);
        self.active_count += 1;
        self.promotions += 1;

        let block = &mut self.blocks[self.active_count - 1];
        bp_log!(trace, "Recycling {:?} buffer block #{} ({})", self.usage, block.id(), format_bytes(block.size()));
        block
    }

    fn create_block(&mut self, size: DeviceSize) -> Result<&mut BufferBlock, PoolError> {
        let buffer = match self.allocator.allocate_buffer(size, self.usage, self.memory_type) {
            Ok(buffer) => buffer,
            Err(err) => {
                bp_emit!(BP901, "{} for {:?}: {}", format_bytes(size), self.usage, err);
                return Err(err.into());
            }
        };

        bp_log!(
            debug,
            "Building #{} buffer block ({} for {:?})",
            self.blocks.len(),
            format_bytes(size),
            self.usage
        );

        self.blocks.push(BufferBlock::from_buffer(buffer, self.alignment));
        // keep inactive blocks behind the active prefix
        let last = self.blocks.len() - 1;
        self.blocks.swap(self.active_count, last);
        self.active_count += 1;
        self.blocks_created += 1;

        Ok(&mut self.blocks[self.active_count - 1])
    }

    /// Number of active blocks at the front of the sequence.
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// All blocks, active prefix first.
    pub fn blocks(&self) -> &[BufferBlock] {
        &self.blocks
    }

    /// Blocks that may hold regions handed out this frame.
    pub fn active_blocks(&self) -> &[BufferBlock] {
        &self.blocks[..self.active_count]
    }

    pub fn block(&self, index: usize) -> Option<&BufferBlock> {
        self.blocks.get(index)
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Minimum capacity of new blocks.
    pub fn block_size(&self) -> DeviceSize {
        self.block_size
    }

    pub fn alignment(&self) -> DeviceSize {
        self.alignment
    }

    pub fn policy(&self) -> PromotionPolicy {
        self.policy
    }

    pub fn allocator(&self) -> &Arc<dyn GpuAllocator> {
        &self.allocator
    }

    /// Snapshot of the pool's blocks and counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            usage: self.usage,
            block_count: self.blocks.len(),
            active_blocks: self.active_count,
            total_capacity: self.blocks.iter().map(BufferBlock::size).sum(),
            bytes_in_use: self.active_blocks().iter().map(BufferBlock::offset).sum(),
            blocks_created: self.blocks_created,
            promotions: self.promotions,
            resets: self.resets,
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("usage", &self.usage)
            .field("block_size", &self.block_size)
            .field("alignment", &self.alignment)
            .field("active_count", &self.active_count)
            .field("blocks", &self.blocks)
            .finish()
    }
}
