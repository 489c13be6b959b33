//! Backing-buffer traits and types
//!
//! This module defines the backend interface WITHOUT pulling in any backend-specific dependencies.
//! Blocks and pools depend on these traits, not on a graphics API.

use thiserror::Error;

/// Device-side size or offset in bytes.
pub type DeviceSize = u64;

/// Errors that can occur while creating or accessing a backing buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuAllocError {
    /// The backend has no room for a buffer of this size
    #[error("GPU out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        requested: DeviceSize,
        available: DeviceSize,
    },
    /// Zero-sized or unrepresentable buffer size
    #[error("Invalid buffer size")]
    InvalidSize,
    /// No alignment rule covers these usage flags
    #[error("Unsupported buffer usage flags {0:?}")]
    UnsupportedUsage(BufferUsage),
    /// Alignment requirements not met
    #[error("Alignment requirements not met")]
    AlignmentFailed,
    /// The buffer lives in memory the CPU cannot map
    #[error("Buffer memory is not host visible")]
    NotMappable,
    /// Access outside the buffer
    #[error("Access of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds {
        offset: DeviceSize,
        len: DeviceSize,
        size: DeviceSize,
    },
    /// Backend-specific error (opaque)
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Buffer usage flags, bit-compatible with `VkBufferUsageFlagBits`.
///
/// Opaque to pools: chosen by the caller and passed through unmodified to
/// backing-buffer creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferUsage {
    pub bits: u32,
}

impl BufferUsage {
    pub const TRANSFER_SRC: Self = Self { bits: 0x0001 };
    pub const TRANSFER_DST: Self = Self { bits: 0x0002 };
    pub const UNIFORM_TEXEL_BUFFER: Self = Self { bits: 0x0004 };
    pub const STORAGE_TEXEL_BUFFER: Self = Self { bits: 0x0008 };
    pub const UNIFORM_BUFFER: Self = Self { bits: 0x0010 };
    pub const STORAGE_BUFFER: Self = Self { bits: 0x0020 };
    pub const INDEX_BUFFER: Self = Self { bits: 0x0040 };
    pub const VERTEX_BUFFER: Self = Self { bits: 0x0080 };
    pub const INDIRECT_BUFFER: Self = Self { bits: 0x0100 };

    /// No usage at all.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Build from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Check whether any of the bits in `other` are set.
    pub const fn intersects(self, other: Self) -> bool {
        self.bits & other.bits != 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self { bits: self.bits | rhs.bits }
    }
}

impl std::ops::BitOrAssign for BufferUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        self.bits |= rhs.bits;
    }
}

impl std::fmt::Debug for BufferUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(BufferUsage, &str); 9] = [
            (BufferUsage::TRANSFER_SRC, "TRANSFER_SRC"),
            (BufferUsage::TRANSFER_DST, "TRANSFER_DST"),
            (BufferUsage::UNIFORM_TEXEL_BUFFER, "UNIFORM_TEXEL_BUFFER"),
            (BufferUsage::STORAGE_TEXEL_BUFFER, "STORAGE_TEXEL_BUFFER"),
            (BufferUsage::UNIFORM_BUFFER, "UNIFORM_BUFFER"),
            (BufferUsage::STORAGE_BUFFER, "STORAGE_BUFFER"),
            (BufferUsage::INDEX_BUFFER, "INDEX_BUFFER"),
            (BufferUsage::VERTEX_BUFFER, "VERTEX_BUFFER"),
            (BufferUsage::INDIRECT_BUFFER, "INDIRECT_BUFFER"),
        ];

        if self.is_empty() {
            return write!(f, "(empty)");
        }

        let mut first = true;
        let mut known = 0;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
                known |= flag.bits;
            }
        }

        let unknown = self.bits & !known;
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{:#x}", unknown)?;
        }
        Ok(())
    }
}

/// Memory type hints for backing buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryType {
    /// Device-local memory (fast for GPU access, not mappable)
    DeviceLocal,
    /// Host-visible memory (CPU writes, GPU reads)
    #[default]
    HostVisible,
    /// Host-coherent memory (automatically synchronized)
    HostCoherent,
    /// Host-cached memory (cached on CPU side)
    HostCached,
}

impl MemoryType {
    /// Whether the CPU can write into buffers of this type.
    pub const fn is_host_visible(self) -> bool {
        !matches!(self, MemoryType::DeviceLocal)
    }
}

/// Offset alignment limits of a device.
///
/// Field names follow `VkPhysicalDeviceLimits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub min_uniform_buffer_offset_alignment: DeviceSize,
    pub min_storage_buffer_offset_alignment: DeviceSize,
    pub min_texel_buffer_offset_alignment: DeviceSize,
}

impl DeviceLimits {
    /// Alignment used for vertex, index, indirect and transfer usage.
    pub const DEFAULT_ALIGNMENT: DeviceSize = 16;

    const KNOWN_USAGE: BufferUsage = BufferUsage::from_bits(0x01ff);

    /// Offset alignment a suballocation with `usage` must honor.
    ///
    /// The strictest rule among the set bits wins.
    pub fn alignment_for(&self, usage: BufferUsage) -> Result<DeviceSize, GpuAllocError> {
        if !usage.intersects(Self::KNOWN_USAGE) {
            return Err(GpuAllocError::UnsupportedUsage(usage));
        }

        let mut alignment = 1;
        if usage.intersects(BufferUsage::UNIFORM_BUFFER) {
            alignment = alignment.max(self.min_uniform_buffer_offset_alignment);
        }
        if usage.intersects(BufferUsage::STORAGE_BUFFER) {
            alignment = alignment.max(self.min_storage_buffer_offset_alignment);
        }
        if usage.intersects(BufferUsage::UNIFORM_TEXEL_BUFFER | BufferUsage::STORAGE_TEXEL_BUFFER) {
            alignment = alignment.max(self.min_texel_buffer_offset_alignment);
        }
        if usage.intersects(
            BufferUsage::VERTEX_BUFFER
                | BufferUsage::INDEX_BUFFER
                | BufferUsage::INDIRECT_BUFFER
                | BufferUsage::TRANSFER_SRC
                | BufferUsage::TRANSFER_DST,
        ) {
            alignment = alignment.max(Self::DEFAULT_ALIGNMENT);
        }
        Ok(alignment)
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 64,
            min_texel_buffer_offset_alignment: 16,
        }
    }
}

/// Backend allocation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpuAllocStats {
    /// Total number of buffers created
    pub allocation_count: u64,
    /// Number of failed buffer creations
    pub failed_allocations: u64,
    /// Bytes currently held by live buffers
    pub allocated_bytes: u64,
    /// Peak of `allocated_bytes`
    pub peak_usage: u64,
}

/// Trait for backing buffer objects
pub trait GpuBuffer: Send + Sync {
    /// Get the size of the buffer in bytes
    fn size(&self) -> DeviceSize;

    /// Usage flags the buffer was created with
    fn usage(&self) -> BufferUsage;

    /// Memory type the buffer lives in
    fn memory_type(&self) -> MemoryType;

    /// Get a raw handle to the buffer
    /// The exact meaning depends on the backend (e.g., vk::Buffer for Vulkan)
    fn raw_handle(&self) -> u64;

    /// Copy `data` into the buffer at `offset`.
    fn write(&mut self, offset: DeviceSize, data: &[u8]) -> Result<(), GpuAllocError>;

    /// Copy bytes at `offset` into `out`.
    fn read(&self, offset: DeviceSize, out: &mut [u8]) -> Result<(), GpuAllocError>;
}

/// Trait for backing-buffer allocators
///
/// Takes `&self` so a single backend can be shared by every pool through an `Arc`.
pub trait GpuAllocator: Send + Sync {
    /// Create a new backing buffer
    fn allocate_buffer(
        &self,
        size: DeviceSize,
        usage: BufferUsage,
        memory_type: MemoryType,
    ) -> Result<Box<dyn GpuBuffer>, GpuAllocError>;

    /// Get the offset alignment requirement for the given usage
    fn alignment_for(&self, usage: BufferUsage) -> Result<DeviceSize, GpuAllocError>;

    /// Get allocation statistics
    fn stats(&self) -> GpuAllocStats;
}

/// Bounds check shared by backends.
pub(crate) fn check_range(
    offset: DeviceSize,
    len: usize,
    size: DeviceSize,
) -> Result<std::ops::Range<usize>, GpuAllocError> {
    let len = len as DeviceSize;
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset as usize..end as usize),
        _ => Err(GpuAllocError::OutOfBounds { offset, len, size }),
    }
}
