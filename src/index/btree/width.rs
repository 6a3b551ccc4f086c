//! Minimal-width little-endian integers and nibble packing.
//!
//! Every integer in a node entry (child page, value, document count) is
//! stored in the fewest bytes that hold it, least significant byte first.
//! Zero takes no bytes at all. Widths are recorded in 4-bit fields of the
//! entry prologue, so a width never exceeds 8.

/// Number of bytes needed to hold `n`; 0 for 0.
///
/// # Example
/// ```
/// use yase_btree::index::btree::width::byte_width;
///
/// assert_eq!(byte_width(0), 0);
/// assert_eq!(byte_width(0xff), 1);
/// assert_eq!(byte_width(0x100), 2);
/// assert_eq!(byte_width(u64::MAX), 8);
/// ```
#[inline]
pub fn byte_width(n: u64) -> usize {
    (64 - n.leading_zeros() as usize).div_ceil(8)
}

/// Write the low `width` bytes of `n` into `out`, returns `width`.
///
/// # Panics
/// Panics if `out` is shorter than `width`.
#[inline]
pub fn write_uint(out: &mut [u8], n: u64, width: usize) -> usize {
    out[..width].copy_from_slice(&n.to_le_bytes()[..width]);
    width
}

/// Read a `width`-byte little-endian integer.
///
/// # Panics
/// Panics if `bytes` is shorter than `width` or `width > 8`.
#[inline]
pub fn read_uint(bytes: &[u8], width: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw[..width].copy_from_slice(&bytes[..width]);
    u64::from_le_bytes(raw)
}

/// Pack two 4-bit values into one byte, `high` in the upper nibble.
#[inline]
pub fn pack_nibbles(high: u8, low: u8) -> u8 {
    ((high & 0x0f) << 4) | (low & 0x0f)
}

/// Split a byte into `(high, low)` nibbles.
#[inline]
pub fn unpack_nibbles(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_boundaries() {
        let cases: [(u64, usize); 12] = [
            (0, 0),
            (1, 1),
            (0xff, 1),
            (0x100, 2),
            (0xffff, 2),
            (0x1_0000, 3),
            (0xff_ffff, 3),
            (0x100_0000, 4),
            (u32::MAX as u64, 4),
            (1 << 32, 5),
            (1 << 56, 8),
            (u64::MAX, 8),
        ];
        for (n, width) in cases {
            assert_eq!(byte_width(n), width, "width of {n:#x}");
        }
    }

    #[test]
    fn test_write_is_little_endian() {
        let mut buf = [0xAAu8; 6];
        assert_eq!(write_uint(&mut buf, 0x0102_0304, 4), 4);
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01, 0xAA, 0xAA]);
    }

    #[test]
    fn test_zero_width_touches_nothing() {
        let mut buf = [0x55u8; 2];
        assert_eq!(write_uint(&mut buf, 0, 0), 0);
        assert_eq!(buf, [0x55, 0x55]);
        assert_eq!(read_uint(&buf, 0), 0);
    }

    #[test]
    fn test_read_back_each_width() {
        for width in 1..=8usize {
            let n = if width == 8 { u64::MAX } else { (1u64 << (8 * width)) - 1 };
            let mut buf = [0u8; 8];
            write_uint(&mut buf, n, byte_width(n));
            assert_eq!(read_uint(&buf, width), n);
        }
    }

    #[test]
    fn test_nibbles() {
        assert_eq!(pack_nibbles(0x4, 0x8), 0x48);
        assert_eq!(unpack_nibbles(0x48), (0x4, 0x8));
        assert_eq!(pack_nibbles(0x1f, 0x0), 0xf0);
    }
}
