//! Session-scoped tag dictionary: assigns each distinct tag name a small
//! integer index on first use, so later `DATA` lines can reference it by
//! number instead of repeating the name.

use heapless::Vec;

/// Maximum number of distinct tags a single session can track. The original
/// firmware sizes this to the number of onboard sensor channels; this is a
/// generous ceiling for a host-side dictionary.
pub const MAX_TAGS: usize = 32;

/// Maps tag names to dictionary indices for the lifetime of one upload
/// session. Indices are never reused or renumbered once assigned.
pub struct Dictionary {
    tags: Vec<heapless::String<16>, MAX_TAGS>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Look up `tag`'s index without assigning one if it isn't already
    /// known. A caller uses this to decide whether a `DICT:` line is needed
    /// before committing to emitting it.
    pub fn get(&self, tag: &str) -> Option<u32> {
        self.tags.iter().position(|t| t.as_str() == tag).map(|p| p as u32)
    }

    /// The index a not-yet-seen tag would receive if registered now.
    pub fn next_index(&self) -> u32 {
        self.tags.len() as u32
    }

    /// Register `tag`, which must not already be known (checked with
    /// [`Dictionary::get`]), returning its newly assigned index.
    pub fn insert(&mut self, tag: &str) -> Result<u32, ()> {
        let mut owned = heapless::String::new();
        owned.push_str(tag).map_err(|_| ())?;
        let index = self.tags.len() as u32;
        self.tags.push(owned).map_err(|_| ())?;
        Ok(index)
    }

    /// Look up `tag`'s index, assigning the next free one if this is the
    /// first time it's been seen. Returns `(index, is_new)`; a caller emits
    /// a `DICT:` line only when `is_new` is true.
    pub fn index_of(&mut self, tag: &str) -> Result<(u32, bool), ()> {
        if let Some(index) = self.get(tag) {
            return Ok((index, false));
        }
        Ok((self.insert(tag)?, true))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_of_a_tag_is_new_and_gets_index_zero() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.index_of("temp").unwrap(), (0, true));
    }

    #[test]
    fn repeated_use_returns_the_same_index_without_being_new() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.index_of("temp").unwrap(), (0, true));
        assert_eq!(dict.index_of("temp").unwrap(), (0, false));
    }

    #[test]
    fn distinct_tags_get_increasing_indices() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.index_of("temp").unwrap().0, 0);
        assert_eq!(dict.index_of("humidity").unwrap().0, 1);
        assert_eq!(dict.index_of("temp").unwrap().0, 0);
        assert_eq!(dict.index_of("pressure").unwrap().0, 2);
    }

    #[test]
    fn exhausting_capacity_reports_an_error_instead_of_panicking() {
        let mut dict = Dictionary::new();
        for i in 0..MAX_TAGS {
            let name = heapless::String::<16>::try_from(format_tag(i).as_str()).unwrap();
            assert!(dict.index_of(&name).is_ok());
        }
        assert!(dict.index_of("one-too-many").is_err());
    }

    fn format_tag(i: usize) -> heapless::String<16> {
        let mut s = heapless::String::new();
        let _ = core::fmt::write(&mut s, format_args!("t{i}"));
        s
    }
}
