use std::collections::HashMap;

/// Location of the live record for one key.
///
/// `value_offset` is the offset of the first byte of the record inside
/// segment `segment_id`; `value_size` is the length of the whole encoded
/// record, so the pair can be handed straight to a point read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDirEntry {
    pub segment_id: u32,
    pub value_offset: u32,
    pub value_size: u32,
    pub timestamp: u32,
}

/// In-memory index from key to [`KeyDirEntry`].
///
/// Not synchronized; the engine guards it together with the segment set.
/// Iteration order is unspecified.
#[derive(Debug)]
pub struct KeyDir {
    map: HashMap<Vec<u8>, KeyDirEntry>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Upsert. Returns the entry that was replaced, if any.
    pub fn insert(&mut self, key: Vec<u8>, entry: KeyDirEntry) -> Option<KeyDirEntry> {
        self.map.insert(key, entry)
    }

    pub fn get(&self, key: &[u8]) -> Option<&KeyDirEntry> {
        self.map.get(key)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<KeyDirEntry> {
        self.map.remove(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// True when `key` currently resolves to the record at
    /// `(segment_id, offset)`. Compaction uses this to tell live records
    /// from stale ones.
    pub fn points_at(&self, key: &[u8], segment_id: u32, offset: u64) -> bool {
        self.map
            .get(key)
            .is_some_and(|e| e.segment_id == segment_id && u64::from(e.value_offset) == offset)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.map.keys().map(Vec::as_slice)
    }

    /// Visits every key, stopping at the first error.
    pub fn fold<F, E>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        for key in self.keys() {
            visit(key)?;
        }
        Ok(())
    }
}

impl Default for KeyDir {
    fn default() -> Self {
        Self::new()
    }
}
