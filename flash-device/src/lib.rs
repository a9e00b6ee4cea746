//! Blocking NOR-flash device abstraction.
//!
//! A [`FlashDevice`] exposes exactly the three operations a log-structured
//! ring buffer needs from raw NOR flash: erase a whole sector back to all
//! ones, clear bits within a sector (never set them), and read bytes back.
//! Implementations are expected to be synchronous blocking calls, the same
//! way the SPI/parallel flash access routines they wrap are.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// MUST be the first module listed
mod fmt;

use core::fmt::Debug;

/// A NOR-flash region addressed as `sector_count()` sectors of
/// `SECTOR_SIZE` bytes each.
///
/// `write` is a bit-clearing operation: every result byte is `old & new`,
/// never a bare overwrite, because that is the only mutation NOR flash
/// supports without an erase. Both `addr` and `data.len()` must be 4-byte
/// aligned; implementations reject misaligned calls rather than silently
/// truncating or rounding.
pub trait FlashDevice<const SECTOR_SIZE: usize> {
    /// Error type returned by a failed erase, write, or read.
    type Error: Debug;

    /// Number of sectors in the region this device exposes.
    fn sector_count(&self) -> u32;

    /// Set every byte of `sector` to `0xFF`. Tickles the watchdog around the
    /// erase so a long wipe does not trip it.
    fn erase_sector(&mut self, sector: u32) -> Result<(), Self::Error>;

    /// AND `data` into the bytes starting at `addr`. `addr` and
    /// `data.len()` must both be multiples of 4.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Feed the watchdog. Long-running erases call this between steps;
    /// the default no-op is correct for devices with no watchdog.
    fn tickle_watchdog(&mut self) {}
}

#[cfg(any(test, feature = "std"))]
pub mod mock;
