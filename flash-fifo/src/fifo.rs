//! The Flash FIFO itself: push / peek / pop / drop over a ring of data
//! sectors, backed by unary counters for head/tail bookkeeping.

use crate::error::define_error;
use crate::fmt::debug;
use crate::layout::{self, FifoLayout};
use crate::sample::{ENCODED_LEN, Sample};
use crate::unary;
use flash_device::FlashDevice;

/// Byte length of each of the four counters this module maintains (the two
/// sector counters and the two per-sector index counters). 32 bytes gives
/// 256 representable values, comfortably above any sane `data_sectors` or
/// `entries_per_sector`; layouts whose `entries_per_sector` exceeds 255 are
/// not supported (matches the original firmware's own 4096-byte-sector
/// sizing, which keeps `entries_per_sector` at 252).
const COUNTER_LEN: usize = 32;

define_error! {
    /// Failures a [`FlashFifo`] operation can report.
    pub enum FlashFifoError<E> {
        Flash(E) => "flash operation failed: {}",
        NotFormatted => "region has not been formatted (magic mismatch)",
    }
}

/// A persistent, power-loss-tolerant FIFO of [`Sample`] records over `D`.
///
/// `SECTOR_SIZE` is the device's erase granularity. Sector 0 holds the
/// region magic plus the head-sector counter; sector 1 holds the
/// tail-sector counter; sectors `[2, 2 + data_sectors)` hold samples.
pub struct FlashFifo<D, const SECTOR_SIZE: usize> {
    flash: D,
    layout: FifoLayout,
    head_sector: u32,
    tail_sector: u32,
    head_index: u32,
    tail_index: u32,
}

impl<D: FlashDevice<SECTOR_SIZE>, const SECTOR_SIZE: usize> FlashFifo<D, SECTOR_SIZE> {
    const HEAD_SECTOR_COUNTER_ADDR: u32 = 4; // sector 0, right after the magic word
    const TAIL_SECTOR_COUNTER_ADDR: u32 = SECTOR_SIZE as u32; // start of sector 1

    /// Check whether `flash` holds a region prepared by [`FlashFifo::format`],
    /// without opening it.
    pub fn valid(flash: &mut D) -> Result<bool, D::Error> {
        let mut magic = [0u8; 4];
        flash.read(0, &mut magic)?;
        Ok(u32::from_le_bytes(magic) == layout::MAGIC)
    }

    /// Erase the whole region and write a fresh header. Destroys any
    /// existing data; only call on first use or an explicit reset.
    pub fn format(mut flash: D, data_sectors: u32) -> Result<Self, FlashFifoError<D::Error>> {
        let layout = FifoLayout::new(SECTOR_SIZE as u32, data_sectors);
        flash.erase_sector(layout::HEAD_SECTOR_COUNTER)?;
        flash.erase_sector(layout::TAIL_SECTOR_COUNTER)?;
        flash.write(0, &layout::MAGIC.to_le_bytes())?;
        for sector in 0..data_sectors {
            flash.erase_sector(layout::FIRST_DATA_SECTOR + sector)?;
        }
        debug!(
            "formatted flash fifo: {} data sectors, {} entries/sector",
            data_sectors, layout.entries_per_sector
        );
        Ok(Self {
            flash,
            layout,
            head_sector: 0,
            tail_sector: 0,
            head_index: 0,
            tail_index: 0,
        })
    }

    /// Open a previously-formatted region, re-deriving head/tail state from
    /// the flash counters. Never writes; existing data survives untouched.
    pub fn open(mut flash: D, data_sectors: u32) -> Result<Self, FlashFifoError<D::Error>> {
        if !Self::valid(&mut flash)? {
            return Err(FlashFifoError::NotFormatted);
        }
        let layout = FifoLayout::new(SECTOR_SIZE as u32, data_sectors);
        let head_sector = Self::read_counter(&mut flash, Self::HEAD_SECTOR_COUNTER_ADDR)?;
        let tail_sector = Self::read_counter(&mut flash, Self::TAIL_SECTOR_COUNTER_ADDR)?;
        let head_index =
            Self::read_counter(&mut flash, layout.head_index_counter_addr(head_sector))?;
        let tail_index =
            Self::read_counter(&mut flash, layout.tail_index_counter_addr(tail_sector))?;
        Ok(Self {
            flash,
            layout,
            head_sector,
            tail_sector,
            head_index,
            tail_index,
        })
    }

    /// Guaranteed capacity: `E * (N - 1)` samples.
    pub fn capacity(&self) -> u32 {
        self.layout.capacity()
    }

    /// Momentary ceiling: `E * N - 1` samples.
    pub fn max_capacity(&self) -> u32 {
        self.layout.max_capacity()
    }

    /// Number of samples currently stored.
    pub fn count(&self) -> u32 {
        let total = self.layout.entries_per_sector * self.layout.data_sectors;
        let head_pos = self.head_sector * self.layout.entries_per_sector + self.head_index;
        let tail_pos = self.tail_sector * self.layout.entries_per_sector + self.tail_index;
        (tail_pos + total - head_pos) % total
    }

    /// Append `sample` at the tail, evicting the oldest `entries_per_sector`
    /// samples as a block if the tail is about to wrap onto the head's
    /// sector.
    pub fn push(&mut self, sample: &Sample) -> Result<(), FlashFifoError<D::Error>> {
        let completes_sector = self.tail_index + 1 == self.layout.entries_per_sector;
        if completes_sector {
            let next_tail = self.layout.next_sector(self.tail_sector);
            if next_tail == self.head_sector {
                self.advance_head_sector()?;
            }
            self.flash
                .erase_sector(layout::FIRST_DATA_SECTOR + next_tail)?;
        }
        let addr = self.layout.sample_addr(self.tail_sector, self.tail_index);
        self.flash.write(addr, &sample.encode())?;
        self.mark_tail_index()?;
        if completes_sector {
            self.advance_tail_sector()?;
        }
        Ok(())
    }

    /// Read the sample `offset` positions after the head without consuming
    /// it. `peek(0)` is the oldest stored sample. Returns `None` if
    /// `offset >= count()`.
    pub fn peek(&mut self, offset: u32) -> Result<Option<Sample>, FlashFifoError<D::Error>> {
        self.resolve_head()?;
        let mut sector = self.head_sector;
        let mut index = self.head_index + offset;
        while sector != self.tail_sector && index >= self.layout.entries_per_sector {
            index -= self.layout.entries_per_sector;
            sector = self.layout.next_sector(sector);
        }
        if sector == self.tail_sector && index >= self.tail_index {
            return Ok(None);
        }
        let addr = self.layout.sample_addr(sector, index);
        let mut buf = [0u8; ENCODED_LEN];
        self.flash.read(addr, &mut buf)?;
        Ok(Some(Sample::decode(&buf)))
    }

    /// Read and consume the oldest sample.
    pub fn pop(&mut self) -> Result<Option<Sample>, FlashFifoError<D::Error>> {
        self.resolve_head()?;
        if self.is_empty_at_head() {
            return Ok(None);
        }
        let addr = self.layout.sample_addr(self.head_sector, self.head_index);
        let mut buf = [0u8; ENCODED_LEN];
        self.flash.read(addr, &mut buf)?;
        self.mark_head_index()?;
        Ok(Some(Sample::decode(&buf)))
    }

    /// Consume the oldest `n` samples without reading them. Returns `false`
    /// (dropping nothing further) as soon as the FIFO runs out, leaving the
    /// successfully-dropped prefix consumed.
    pub fn drop_front(&mut self, n: u32) -> Result<bool, FlashFifoError<D::Error>> {
        for _ in 0..n {
            self.resolve_head()?;
            if self.is_empty_at_head() {
                return Ok(false);
            }
            self.mark_head_index()?;
        }
        Ok(true)
    }

    fn is_empty_at_head(&self) -> bool {
        self.head_sector == self.tail_sector && self.head_index >= self.tail_index
    }

    /// Lazily cross a sector boundary on the head side: detected here, on
    /// the next access, rather than eagerly at the moment the last sample
    /// of a sector was consumed.
    fn resolve_head(&mut self) -> Result<(), D::Error> {
        if self.head_index >= self.layout.entries_per_sector {
            self.advance_head_sector()?;
        }
        Ok(())
    }

    fn mark_tail_index(&mut self) -> Result<(), D::Error> {
        let addr = self.layout.tail_index_counter_addr(self.tail_sector);
        unary::mark(&mut self.flash, addr, self.tail_index)?;
        self.tail_index += 1;
        Ok(())
    }

    fn mark_head_index(&mut self) -> Result<(), D::Error> {
        let addr = self.layout.head_index_counter_addr(self.head_sector);
        unary::mark(&mut self.flash, addr, self.head_index)?;
        self.head_index += 1;
        Ok(())
    }

    fn advance_tail_sector(&mut self) -> Result<(), D::Error> {
        let next = self.layout.next_sector(self.tail_sector);
        if next == 0 {
            self.flash.erase_sector(layout::TAIL_SECTOR_COUNTER)?;
        } else {
            unary::mark(&mut self.flash, Self::TAIL_SECTOR_COUNTER_ADDR, self.tail_sector)?;
        }
        self.tail_sector = next;
        self.tail_index = 0;
        Ok(())
    }

    fn advance_head_sector(&mut self) -> Result<(), D::Error> {
        let next = self.layout.next_sector(self.head_sector);
        if next == 0 {
            self.flash.erase_sector(layout::HEAD_SECTOR_COUNTER)?;
        } else {
            unary::mark(&mut self.flash, Self::HEAD_SECTOR_COUNTER_ADDR, self.head_sector)?;
        }
        self.head_sector = next;
        self.head_index = 0;
        Ok(())
    }

    fn read_counter(flash: &mut D, base_addr: u32) -> Result<u32, D::Error> {
        let mut buf = [0u8; COUNTER_LEN];
        flash.read(base_addr, &mut buf)?;
        Ok(unary::read(&buf))
    }

    /// Borrow the underlying device, e.g. to persist it after a mutating
    /// call returns.
    pub fn flash_ref(&self) -> &D {
        &self.flash
    }

    /// A not-restartable cursor over samples from the head forward, for
    /// feeding an uploader without consuming anything until it `drop_front`s
    /// an acknowledged prefix.
    pub fn cursor(&mut self) -> PeekCursor<'_, D, SECTOR_SIZE> {
        PeekCursor {
            fifo: self,
            offset: 0,
        }
    }
}

/// Lazily walks samples from the head forward without consuming them.
pub struct PeekCursor<'a, D, const SECTOR_SIZE: usize> {
    fifo: &'a mut FlashFifo<D, SECTOR_SIZE>,
    offset: u32,
}

impl<'a, D: FlashDevice<SECTOR_SIZE>, const SECTOR_SIZE: usize> PeekCursor<'a, D, SECTOR_SIZE> {
    /// Next sample after the head, or `None` once the tail is reached.
    pub fn next(&mut self) -> Result<Option<Sample>, FlashFifoError<D::Error>> {
        let sample = self.fifo.peek(self.offset)?;
        if sample.is_some() {
            self.offset += 1;
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_device::mock::MemoryFlash;

    // entries_per_sector = (sector_size - D_OFF) / 16; 128 gives E = 4.
    const SECTOR_SIZE: usize = 128;

    fn open_fresh(data_sectors: u32) -> FlashFifo<MemoryFlash<SECTOR_SIZE>, SECTOR_SIZE> {
        let flash = MemoryFlash::<SECTOR_SIZE>::new(data_sectors + layout::FIRST_DATA_SECTOR);
        FlashFifo::format(flash, data_sectors).unwrap()
    }

    fn sample(n: u32) -> Sample {
        Sample {
            timestamp: 1000 + n,
            value: n as i32,
            decimals: 0,
            tag: Sample::tag_from_str("t"),
        }
    }

    #[test]
    fn push_pop_parity() {
        let mut fifo = open_fresh(3);
        let s = Sample {
            timestamp: 1000,
            value: 42,
            decimals: 0,
            tag: Sample::tag_from_str("t"),
        };
        fifo.push(&s).unwrap();
        assert_eq!(fifo.count(), 1);
        assert_eq!(fifo.pop().unwrap(), Some(s));
        assert_eq!(fifo.count(), 0);
    }

    #[test]
    fn fifo_orders_samples_by_push_order() {
        let mut fifo = open_fresh(3);
        for n in 0..6 {
            fifo.push(&sample(n)).unwrap();
        }
        for n in 0..6 {
            assert_eq!(fifo.pop().unwrap().unwrap().value, n as i32);
        }
        assert_eq!(fifo.pop().unwrap(), None);
    }

    #[test]
    fn sample_e_completes_sector_and_erases_next() {
        // N=3, E=4: the 4th push into a sector must retire it and
        // pre-erase data sector (tail_sector+1) mod N.
        let mut fifo = open_fresh(3);
        for n in 0..4 {
            fifo.push(&sample(n)).unwrap();
        }
        assert_eq!(fifo.tail_sector, 1);
        assert_eq!(fifo.tail_index, 0);
    }

    #[test]
    fn wrap_evicts_exactly_one_sector_of_samples() {
        // N=3, E=4: guaranteed capacity is 8. Filling sectors 0 and 1 (8
        // samples) reaches capacity with no eviction; the push that would
        // retire sector 2 and wrap onto sector 0 (still holding the head)
        // evicts exactly sector 0's E=4 samples as a block.
        let mut fifo = open_fresh(3);
        for n in 0..8 {
            fifo.push(&sample(n)).unwrap();
        }
        assert_eq!(fifo.count(), 8);
        assert_eq!(fifo.peek(0).unwrap().unwrap().value, 0);

        for n in 8..12 {
            fifo.push(&sample(n)).unwrap();
        }
        // Sector 0 (samples 0..3) was evicted to make room for sample 11.
        assert_eq!(fifo.count(), 8);
        assert_eq!(fifo.peek(0).unwrap().unwrap().value, 4);
        assert_eq!(fifo.head_sector, 1);
    }

    #[test]
    fn peek_past_count_returns_none() {
        let mut fifo = open_fresh(3);
        fifo.push(&sample(0)).unwrap();
        assert!(fifo.peek(1).unwrap().is_none());
    }

    #[test]
    fn decode_encode_round_trip_through_flash() {
        let mut fifo = open_fresh(3);
        let s = Sample {
            timestamp: 42,
            value: -7,
            decimals: 2,
            tag: Sample::tag_from_str("ab"),
        };
        fifo.push(&s).unwrap();
        assert_eq!(fifo.peek(0).unwrap(), Some(s));
    }

    #[test]
    fn reopen_after_format_preserves_pushed_data() {
        let flash = MemoryFlash::<SECTOR_SIZE>::new(3 + layout::FIRST_DATA_SECTOR);
        let mut fifo = FlashFifo::format(flash, 3).unwrap();
        for n in 0..3 {
            fifo.push(&sample(n)).unwrap();
        }
        let flash = fifo.flash;
        let mut reopened = FlashFifo::<_, SECTOR_SIZE>::open(flash, 3).unwrap();
        assert_eq!(reopened.count(), 3);
        assert_eq!(reopened.pop().unwrap().unwrap().value, 0);
    }

    #[test]
    fn single_step_flash_failure_leaves_no_torn_state() {
        use flash_device::mock::MockFlashError;
        let flash = MemoryFlash::<SECTOR_SIZE>::new(3 + layout::FIRST_DATA_SECTOR);
        let mut fifo = FlashFifo::format(flash, 3).unwrap();
        fifo.push(&sample(0)).unwrap();
        let count_before = fifo.count();
        fifo.flash.fail_next_op(MockFlashError::Injected);
        assert!(fifo.push(&sample(1)).is_err());
        // The failed write never happened: count is exactly the pre-failure
        // value, not a half-applied one.
        assert_eq!(fifo.count(), count_before);
        // A retry after the fault clears succeeds normally.
        fifo.push(&sample(1)).unwrap();
        assert_eq!(fifo.count(), count_before + 1);
    }
}
