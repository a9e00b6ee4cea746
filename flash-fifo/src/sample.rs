//! The 16-byte sample record stored in each FIFO slot.

/// One sample: a timestamp, a raw reading, how many implicit decimal places
/// the reading carries, and a short tag naming the metric stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Seconds since the Unix epoch.
    pub timestamp: u32,
    /// Raw integer reading; `decimals` places are implied when rendering.
    pub value: i32,
    /// Number of implicit decimal shifts applied to `value`, 0-7.
    pub decimals: u8,
    /// Four ASCII bytes identifying the metric, zero-padded when shorter.
    pub tag: [u8; 4],
}

/// On-flash size of one sample record.
pub const ENCODED_LEN: usize = 16;

impl Sample {
    /// Encode as four 32-bit little-endian words: timestamp, value,
    /// decimals, tag.
    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut out = [0u8; ENCODED_LEN];
        out[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        out[4..8].copy_from_slice(&(self.value as u32).to_le_bytes());
        out[8..12].copy_from_slice(&(self.decimals as u32).to_le_bytes());
        out[12..16].copy_from_slice(&u32::from_le_bytes(self.tag).to_le_bytes());
        out
    }

    /// Decode a record previously produced by [`Sample::encode`].
    pub fn decode(bytes: &[u8; ENCODED_LEN]) -> Self {
        let timestamp = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let value = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as i32;
        let decimals = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as u8;
        let tag = bytes[12..16].try_into().unwrap();
        Self {
            timestamp,
            value,
            decimals,
            tag,
        }
    }

    /// Pack up to four ASCII bytes of `s` into a tag, zero-padding any
    /// remainder. Extra bytes beyond the fourth are ignored.
    pub fn tag_from_str(s: &str) -> [u8; 4] {
        let mut tag = [0u8; 4];
        for (slot, byte) in tag.iter_mut().zip(s.as_bytes()) {
            *slot = *byte;
        }
        tag
    }

    /// Tag bytes as a `&str`, stopping at the first zero byte (or at 4
    /// bytes if none). Returns `None` if the non-zero prefix isn't valid
    /// UTF-8 (it is always valid ASCII when produced by `tag_from_str`).
    pub fn tag_as_str(&self) -> Option<&str> {
        let len = self
            .tag
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.tag.len());
        core::str::from_utf8(&self.tag[..len]).ok()
    }
}

/// `10^decimals`, the divisor implied by a sample's `decimals` field.
pub const fn decimals_divisor(decimals: u8) -> u32 {
    let mut divisor = 1u32;
    let mut remaining = decimals;
    while remaining > 0 {
        divisor *= 10;
        remaining -= 1;
    }
    divisor
}
