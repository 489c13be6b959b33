//! Pool configuration.

use crate::gpu::{BufferUsage, DeviceSize, MemoryType};
use crate::util::size::kb;

/// How a pool picks among inactive blocks that are large enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionPolicy {
    /// First fitting block in sequence order (lowest index).
    ///
    /// Blocks keep their order across resets, so this favours the blocks
    /// that were active most recently.
    #[default]
    FirstFit,
    /// Smallest fitting block; ties go to the lowest index.
    ///
    /// Keeps large blocks available for large requests at the cost of a
    /// scan over every inactive block.
    BestFit,
}

/// Configuration for a single [`BufferPool`](crate::BufferPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Minimum capacity of newly created blocks
    pub block_size: DeviceSize,

    /// Usage flags shared by every block of the pool
    pub usage: BufferUsage,

    /// Memory the backing buffers live in (default: host visible)
    pub memory_type: MemoryType,

    /// Inactive block selection
    pub policy: PromotionPolicy,
}

impl PoolConfig {
    /// Create a config with host-visible memory and first-fit promotion.
    pub fn new(block_size: DeviceSize, usage: BufferUsage) -> Self {
        Self {
            block_size,
            usage,
            memory_type: MemoryType::HostVisible,
            policy: PromotionPolicy::FirstFit,
        }
    }

    /// Builder pattern: set memory type.
    pub fn with_memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    /// Builder pattern: set promotion policy.
    pub fn with_policy(mut self, policy: PromotionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Configuration for [`FrameBuffers`](crate::FrameBuffers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffersConfig {
    /// Base block size, scaled per usage by the multiplier (default: 256 KB)
    pub block_size: DeviceSize,

    /// Number of recording threads, one pool per usage each (default: 1)
    pub thread_count: usize,

    /// Supported usages with their block size multipliers
    pub usages: Vec<(BufferUsage, u32)>,

    /// Memory the backing buffers live in
    pub memory_type: MemoryType,

    /// Inactive block selection for every pool
    pub policy: PromotionPolicy,
}

impl Default for FrameBuffersConfig {
    fn default() -> Self {
        Self {
            block_size: kb(256),
            thread_count: 1,
            usages: vec![
                (BufferUsage::UNIFORM_BUFFER, 1),
                (BufferUsage::STORAGE_BUFFER, 2),
                (BufferUsage::VERTEX_BUFFER, 1),
                (BufferUsage::INDEX_BUFFER, 1),
            ],
            memory_type: MemoryType::HostVisible,
            policy: PromotionPolicy::FirstFit,
        }
    }
}

impl FrameBuffersConfig {
    /// Create a minimal config for testing or constrained environments.
    pub fn minimal() -> Self {
        Self {
            block_size: kb(16),
            ..Self::default()
        }
    }

    /// Builder pattern: set base block size.
    pub fn with_block_size(mut self, size: DeviceSize) -> Self {
        self.block_size = size;
        self
    }

    /// Builder pattern: set thread count.
    pub fn with_thread_count(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    /// Builder pattern: add a usage, or change the multiplier of a known one.
    pub fn with_usage(mut self, usage: BufferUsage, multiplier: u32) -> Self {
        match self.usages.iter_mut().find(|(u, _)| *u == usage) {
            Some(entry) => entry.1 = multiplier,
            None => self.usages.push((usage, multiplier)),
        }
        self
    }

    /// Builder pattern: set memory type.
    pub fn with_memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    /// Builder pattern: set promotion policy.
    pub fn with_policy(mut self, policy: PromotionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pool config for one usage entry.
    pub(crate) fn pool_config(&self, usage: BufferUsage, multiplier: u32) -> PoolConfig {
        PoolConfig::new(self.block_size.saturating_mul(multiplier as DeviceSize), usage)
            .with_memory_type(self.memory_type)
            .with_policy(self.policy)
    }
}
