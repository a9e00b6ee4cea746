//! Unary (monotone-clearable) counters.
//!
//! A counter occupies a fixed byte range of a sector. Its value is the
//! index of the first set bit in that range, scanning 32-bit little-endian
//! words low word first and, within a word, least-significant bit first.
//! Advancing the counter clears exactly one bit — the one at the current
//! value — which can only ever increase the value, never decrease it or
//! leave it unchanged. The all-zero state (every bit cleared) is not a
//! legal value: it cannot be distinguished from "one past the end", so
//! counters must be reset by erasing their sector before they get there.

use flash_device::FlashDevice;

/// One past the largest value `region_len` bytes can represent.
pub const fn capacity(region_len: usize) -> u32 {
    (region_len as u32) * 8
}

/// Read the current value of a counter occupying `region`.
///
/// Returns `capacity(region.len())` if every bit in the region is already
/// clear — a state callers must never produce via [`mark`], but which can
/// still be read back without panicking.
pub fn read(region: &[u8]) -> u32 {
    for (word_index, chunk) in region.chunks(4).enumerate() {
        let mut word_bytes = [0u8; 4];
        word_bytes[..chunk.len()].copy_from_slice(chunk);
        let word = u32::from_le_bytes(word_bytes);
        if word != 0 {
            return (word_index as u32) * 32 + word.trailing_zeros();
        }
    }
    capacity(region.len())
}

/// Advance a counter from `value` to `value + 1` by clearing bit `value`.
///
/// `base_addr` is the flash address of the start of the counter's region.
/// The caller is responsible for ensuring `value + 1 < capacity(region_len)`
/// before calling; the counter must never be advanced to its capacity.
pub fn mark<D: FlashDevice<SECTOR_SIZE>, const SECTOR_SIZE: usize>(
    flash: &mut D,
    base_addr: u32,
    value: u32,
) -> Result<(), D::Error> {
    let word_index = value / 32;
    let bit_index = value % 32;
    let mask: u32 = !(1u32 << bit_index);
    let word_addr = base_addr + word_index * 4;
    flash.write(word_addr, &mask.to_le_bytes())
}
