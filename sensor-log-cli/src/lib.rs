//! sensor-log-cli library
//!
//! Reusable pieces of the demo: a file-backed flash device and a plain-TCP
//! transport, plus the FIFO open/save helpers shared by the binary and its
//! integration tests.

pub mod flash_file;
pub mod transport;

use std::path::Path;

use flash_fifo::FlashFifo;

use flash_file::FileBackedFlash;

/// Open the FIFO stored at `image`, formatting it fresh if the file doesn't
/// exist yet or doesn't carry a valid region header.
pub fn open_fifo<const SECTOR_SIZE: usize>(
    image: &Path,
    data_sectors: u32,
) -> std::io::Result<FlashFifo<FileBackedFlash<SECTOR_SIZE>, SECTOR_SIZE>> {
    let mut flash = FileBackedFlash::<SECTOR_SIZE>::load(image, 2 + data_sectors)?;
    let fifo = if FlashFifo::<FileBackedFlash<SECTOR_SIZE>, SECTOR_SIZE>::valid(&mut flash)
        .unwrap_or(false)
    {
        FlashFifo::open(flash, data_sectors)
    } else {
        FlashFifo::format(flash, data_sectors)
    }
    .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(fifo)
}

/// Persist the FIFO's backing image back to `image`.
pub fn save_fifo<const SECTOR_SIZE: usize>(
    image: &Path,
    fifo: &FlashFifo<FileBackedFlash<SECTOR_SIZE>, SECTOR_SIZE>,
) -> std::io::Result<()> {
    fifo.flash_ref().save(image)
}
