//! Pool statistics.

use crate::gpu::{BufferUsage, DeviceSize};
use crate::util::size::format_bytes;

/// Snapshot of a pool's blocks and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Usage flags of the pool.
    pub usage: BufferUsage,

    /// Blocks owned by the pool, active or not.
    pub block_count: usize,

    /// Blocks active this frame.
    pub active_blocks: usize,

    /// Sum of all block capacities (backing memory held).
    pub total_capacity: DeviceSize,

    /// Bytes consumed in active blocks, alignment padding included.
    pub bytes_in_use: DeviceSize,

    /// Blocks constructed over the pool's lifetime.
    pub blocks_created: u64,

    /// Inactive blocks brought back into use.
    pub promotions: u64,

    /// Number of `reset()` calls.
    pub resets: u64,
}

impl PoolStats {
    /// Fraction of the held backing memory in use this frame.
    pub fn utilization(&self) -> f64 {
        if self.total_capacity == 0 {
            return 0.0;
        }
        self.bytes_in_use as f64 / self.total_capacity as f64
    }

    /// Fraction of block requests served without constructing a block.
    pub fn reuse_ratio(&self) -> f64 {
        let requests = self.blocks_created + self.promotions;
        if requests == 0 {
            return 0.0;
        }
        self.promotions as f64 / requests as f64
    }
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Buffer Pool {:?}:", self.usage)?;
        writeln!(f, "  Blocks:          {} ({} active)", self.block_count, self.active_blocks)?;
        writeln!(f, "  Capacity:        {}", format_bytes(self.total_capacity))?;
        writeln!(f, "  In use:          {}", format_bytes(self.bytes_in_use))?;
        writeln!(f, "  Blocks created:  {}", self.blocks_created)?;
        writeln!(f, "  Promotions:      {}", self.promotions)?;
        writeln!(f, "  Resets:          {}", self.resets)?;
        Ok(())
    }
}
