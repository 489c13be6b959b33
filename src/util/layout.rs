//! Alignment utilities for device offsets.

/// Round `size` up to the next multiple of `align`.
///
/// Returns `None` on overflow. `align` must be non-zero; it does not have to
/// be a power of two.
#[inline]
pub const fn align_up(size: u64, align: u64) -> Option<u64> {
    let rem = size % align;
    if rem == 0 {
        Some(size)
    } else {
        size.checked_add(align - rem)
    }
}

/// Check whether `offset` is a multiple of `align`.
#[inline]
pub const fn is_aligned(offset: u64, align: u64) -> bool {
    offset % align == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), Some(0));
        assert_eq!(align_up(1, 16), Some(16));
        assert_eq!(align_up(16, 16), Some(16));
        assert_eq!(align_up(50, 16), Some(64));
        assert_eq!(align_up(5000, 256), Some(5120));
    }

    #[test]
    fn test_align_up_non_power_of_two() {
        assert_eq!(align_up(10, 12), Some(12));
        assert_eq!(align_up(25, 12), Some(36));
    }

    #[test]
    fn test_align_up_overflow() {
        assert_eq!(align_up(u64::MAX, 16), None);
        assert_eq!(align_up(u64::MAX - 15, 16), Some(u64::MAX - 15));
    }
}
