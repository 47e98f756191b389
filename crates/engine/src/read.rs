//! Read path: `get()`, `has()` and `fold()`.
//!
//! All three hold the shared lock for their whole duration, so a merge can
//! never delete a segment out from under a lookup.

use crate::{Db, Error, Result};

impl Db {
    /// Returns the current value of `key`.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if the key is absent.
    /// - `ChecksumMismatch` if the stored value fails its CRC.
    /// - `Corruption` if the record cannot be decoded, belongs to another
    ///   key, or lives in a segment that no longer exists.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let state = self.read_state()?;
        let loc = *state.keydir.get(key).ok_or(Error::KeyNotFound)?;

        let segment = state.segment(loc.segment_id).ok_or_else(|| {
            Error::Corruption(format!(
                "key directory points at missing segment {}",
                loc.segment_id
            ))
        })?;

        let entry = segment.read_at(u64::from(loc.value_offset), u64::from(loc.value_size))?;

        if entry.key != key {
            return Err(Error::Corruption(format!(
                "record at segment {} offset {} belongs to another key",
                loc.segment_id, loc.value_offset
            )));
        }
        if !entry.verify() {
            return Err(Error::ChecksumMismatch {
                segment_id: loc.segment_id,
                offset: loc.value_offset,
            });
        }

        Ok(entry.value)
    }

    /// Key directory membership; never touches disk.
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.read_state()?.keydir.contains_key(key))
    }

    /// Calls `visit` once for every live key, in unspecified order, stopping
    /// at the first error it returns.
    ///
    /// The shared lock is held for the whole traversal, so `visit` must not
    /// call back into a mutating method of the same `Db`.
    pub fn fold<F, E>(&self, visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(&[u8]) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        let state = self.read_state()?;
        state.keydir.fold(visit)
    }
}
