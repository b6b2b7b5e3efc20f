//! Section-header string table builder.
//!
//! ELF section names are stored as null-terminated strings in a dedicated
//! string-table section; every section header references its name by byte
//! offset into that table. This builder is append-only: entries are never
//! removed or renamed, and repeated insertions of the same string share one
//! offset.

use std::collections::HashMap;

/// Deduplicating, append-only ELF string table.
///
/// The table always starts with a null byte (offset 0 = empty name), matching
/// ELF convention. A table seeded from a source image via [`load_existing`]
/// preserves the seeded bytes verbatim; new strings append after them.
///
/// [`load_existing`]: StringTable::load_existing
pub struct StringTable {
    data: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringTable {
    /// Create a new string table containing only the initial null entry.
    pub fn new() -> Self {
        Self {
            data: vec![0],
            offsets: HashMap::new(),
        }
    }

    /// Seed the table from the raw bytes of an existing string-table section.
    ///
    /// The bytes are the concatenation of null-terminated strings; offsets of
    /// the existing entries are recovered positionally so that later `add`
    /// calls for the same names return the original offsets. Replaces any
    /// previous contents.
    pub fn load_existing(&mut self, bytes: &[u8]) {
        self.data = bytes.to_vec();
        self.offsets.clear();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if b == 0 {
                if i > start {
                    if let Ok(s) = std::str::from_utf8(&bytes[start..i]) {
                        self.offsets.entry(s.to_string()).or_insert(start as u32);
                    }
                }
                start = i + 1;
            }
        }
    }

    /// Add a string to the table and return its offset.
    ///
    /// Returns 0 for the empty string. Dedup is by exact match only; adding a
    /// string already present returns its first-seen offset without growing
    /// the table.
    pub fn add(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&offset) = self.offsets.get(s) {
            return offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }

    /// The raw table bytes, suitable for writing back into the destination
    /// string-table section.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Current size of the table in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_for_equal_strings() {
        let mut tab = StringTable::new();
        let a = tab.add(".debug_info");
        let b = tab.add(".debug_info");
        assert_eq!(a, b);
        assert_eq!(tab.len(), 1 + ".debug_info".len() as u64 + 1);
    }

    #[test]
    fn distinct_strings_do_not_overlap() {
        let mut tab = StringTable::new();
        let a = tab.add(".text") as usize;
        let b = tab.add(".data") as usize;
        assert_ne!(a, b);
        let bytes = tab.as_bytes();
        assert_eq!(&bytes[a..a + 6], b".text\0");
        assert_eq!(&bytes[b..b + 6], b".data\0");
    }

    #[test]
    fn empty_string_maps_to_zero() {
        let mut tab = StringTable::new();
        assert_eq!(tab.add(""), 0);
        assert_eq!(tab.len(), 1);
    }

    #[test]
    fn load_existing_recovers_offsets() {
        let mut tab = StringTable::new();
        tab.load_existing(b"\0.shstrtab\0.text\0");
        assert_eq!(tab.add(".shstrtab"), 1);
        assert_eq!(tab.add(".text"), 11);
        // Seeded bytes preserved verbatim, nothing appended.
        assert_eq!(tab.as_bytes(), b"\0.shstrtab\0.text\0");
        // A new string goes after the seeded contents.
        assert_eq!(tab.add(".debug_info"), 17);
    }
}
