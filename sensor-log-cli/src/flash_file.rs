//! A file-backed [`FlashDevice`] for the CLI demo: loads the whole region
//! into memory at startup and writes it back out on save, since each CLI
//! invocation is a short-lived process rather than a long-running daemon
//! holding the flash open.

use std::fs;
use std::io;
use std::path::Path;

use flash_device::FlashDevice;

pub struct FileBackedFlash<const SECTOR_SIZE: usize> {
    sectors: Vec<[u8; SECTOR_SIZE]>,
}

impl<const SECTOR_SIZE: usize> FileBackedFlash<SECTOR_SIZE> {
    /// Load `path` if it exists and is the right size, otherwise create a
    /// freshly-erased region of `sector_count` sectors.
    pub fn load(path: &Path, sector_count: u32) -> io::Result<Self> {
        let expected_len = sector_count as usize * SECTOR_SIZE;
        match fs::read(path) {
            Ok(bytes) if bytes.len() == expected_len => {
                let mut sectors = Vec::with_capacity(sector_count as usize);
                for chunk in bytes.chunks_exact(SECTOR_SIZE) {
                    let mut sector = [0u8; SECTOR_SIZE];
                    sector.copy_from_slice(chunk);
                    sectors.push(sector);
                }
                Ok(Self { sectors })
            }
            _ => Ok(Self {
                sectors: vec![[0xFFu8; SECTOR_SIZE]; sector_count as usize],
            }),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(self.sectors.len() * SECTOR_SIZE);
        for sector in &self.sectors {
            bytes.extend_from_slice(sector);
        }
        fs::write(path, bytes)
    }
}

impl<const SECTOR_SIZE: usize> FlashDevice<SECTOR_SIZE> for FileBackedFlash<SECTOR_SIZE> {
    type Error = std::convert::Infallible;

    fn sector_count(&self) -> u32 {
        self.sectors.len() as u32
    }

    fn erase_sector(&mut self, sector: u32) -> Result<(), Self::Error> {
        self.sectors[sector as usize] = [0xFFu8; SECTOR_SIZE];
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
        let sector_index = addr as usize / SECTOR_SIZE;
        let offset = addr as usize % SECTOR_SIZE;
        let sector = &mut self.sectors[sector_index];
        for (slot, byte) in sector[offset..offset + data.len()].iter_mut().zip(data) {
            *slot &= *byte;
        }
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let sector_index = addr as usize / SECTOR_SIZE;
        let offset = addr as usize % SECTOR_SIZE;
        buf.copy_from_slice(&self.sectors[sector_index][offset..offset + buf.len()]);
        Ok(())
    }
}
