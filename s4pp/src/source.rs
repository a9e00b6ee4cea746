//! The "dynamic iterator protocol": a finite, non-restartable capability
//! that yields samples for an upload session one at a time.

use flash_fifo::Sample;

/// One sample as handed to the upload engine, already carrying a resolved
/// tag name rather than the packed 4-byte encoding stored on flash.
#[derive(Debug, Clone)]
pub struct UploadSample {
    pub name: heapless::String<16>,
    pub unit: heapless::String<8>,
    pub unitdiv: heapless::String<8>,
    pub time: i64,
    pub value: i32,
    pub decimals: u8,
}

/// A finite, non-restartable source of samples to upload.
pub trait SampleSource {
    type Error;

    /// Produce the next sample, or `None` at end-of-data. Once `None` is
    /// returned the source must not be polled again.
    fn next(&mut self) -> Result<Option<UploadSample>, Self::Error>;
}

/// A `SampleSource` over an in-memory slice, for tests and small demos.
pub struct SliceSource<'a> {
    samples: &'a [UploadSample],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(samples: &'a [UploadSample]) -> Self {
        Self { samples, pos: 0 }
    }
}

impl<'a> SampleSource for SliceSource<'a> {
    type Error = core::convert::Infallible;

    fn next(&mut self) -> Result<Option<UploadSample>, Self::Error> {
        if self.pos >= self.samples.len() {
            return Ok(None);
        }
        let sample = self.samples[self.pos].clone();
        self.pos += 1;
        Ok(Some(sample))
    }
}

/// A `SampleSource` over the flash FIFO's peek cursor: samples are read, not
/// popped, so a caller must `drop_front` the acknowledged count once the
/// upload session reports success.
pub struct FifoSource<'a, D, const SECTOR_SIZE: usize> {
    fifo: &'a mut flash_fifo::FlashFifo<D, SECTOR_SIZE>,
    offset: u32,
}

impl<'a, D, const SECTOR_SIZE: usize> FifoSource<'a, D, SECTOR_SIZE> {
    pub fn new(fifo: &'a mut flash_fifo::FlashFifo<D, SECTOR_SIZE>) -> Self {
        Self { fifo, offset: 0 }
    }
}

impl<'a, D: flash_device::FlashDevice<SECTOR_SIZE>, const SECTOR_SIZE: usize> SampleSource
    for FifoSource<'a, D, SECTOR_SIZE>
{
    type Error = flash_fifo::FlashFifoError<D::Error>;

    fn next(&mut self) -> Result<Option<UploadSample>, Self::Error> {
        let sample = self.fifo.peek(self.offset)?;
        let Some(sample) = sample else {
            return Ok(None);
        };
        self.offset += 1;
        Ok(Some(from_flash_sample(&sample)))
    }
}

fn from_flash_sample(sample: &Sample) -> UploadSample {
    let mut name = heapless::String::new();
    let _ = name.push_str(sample.tag_as_str().unwrap_or(""));
    UploadSample {
        name,
        unit: heapless::String::new(),
        // flash_fifo::Sample carries no unitdiv; the wire format's default
        // is "1", not empty.
        unitdiv: heapless::String::try_from("1").unwrap(),
        time: sample.timestamp as i64,
        value: sample.value,
        decimals: sample.decimals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, time: i64, value: i32) -> UploadSample {
        UploadSample {
            name: heapless::String::try_from(name).unwrap(),
            unit: heapless::String::new(),
            unitdiv: heapless::String::try_from("1").unwrap(),
            time,
            value,
            decimals: 0,
        }
    }

    #[test]
    fn slice_source_yields_in_order_then_ends() {
        let samples = [sample("a", 1, 1), sample("b", 2, 2)];
        let mut source = SliceSource::new(&samples);
        assert_eq!(source.next().unwrap().unwrap().name, "a");
        assert_eq!(source.next().unwrap().unwrap().name, "b");
        assert!(source.next().unwrap().is_none());
    }

    #[test]
    fn fifo_source_defaults_unitdiv_to_one() {
        const SECTOR_SIZE: usize = 64;
        let flash = flash_device::mock::MemoryFlash::<SECTOR_SIZE>::new(4);
        let mut fifo = flash_fifo::FlashFifo::format(flash, 3).unwrap();
        fifo.push(&Sample {
            timestamp: 1_000,
            value: 215,
            decimals: 1,
            tag: Sample::tag_from_str("T"),
        })
        .unwrap();

        let mut source = FifoSource::new(&mut fifo);
        let uploaded = source.next().unwrap().unwrap();
        assert_eq!(uploaded.unit, "");
        assert_eq!(uploaded.unitdiv, "1");
    }
}
