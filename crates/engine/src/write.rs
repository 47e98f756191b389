//! Write path: `put()`, `delete()` and active-segment rotation.
//!
//! Every mutation appends a record to the active segment first and updates
//! the key directory second, both under the exclusive lock.

use keydir::KeyDirEntry;
use log::debug;
use record::{unix_timestamp, Entry, MAX_KEY_SIZE, MAX_VALUE_SIZE, TOMBSTONE};
use std::path::Path;

use crate::{to_u32, Db, Error, Options, Result, State};

pub(crate) fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::EmptyKey);
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(Error::KeyTooLarge {
            len: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

impl State {
    /// Appends `entry` to the active segment, rotating first if the active
    /// segment has reached the configured size. Returns where it landed.
    pub(crate) fn append(
        &mut self,
        dir: &Path,
        options: &Options,
        entry: &Entry,
    ) -> Result<KeyDirEntry> {
        if self.active.size() >= options.max_segment_size {
            self.replace_active(dir)?;
        }

        let value_offset = to_u32(self.active.size())?;
        let (_, len) = self.active.write(entry)?;
        if options.sync_on_put {
            self.active.sync()?;
        }

        Ok(KeyDirEntry {
            segment_id: self.active.id(),
            value_offset,
            value_size: to_u32(len)?,
            timestamp: entry.timestamp,
        })
    }
}

impl Db {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Validation errors (`EmptyKey`, `KeyTooLarge`, `ValueTooLarge`,
    /// `ReservedValue`) are returned before anything is written. I/O errors
    /// from the append are returned as-is; a partially written record is not
    /// rolled back and is ignored as a torn tail on the next open.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::ValueTooLarge {
                len: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        if value == TOMBSTONE {
            return Err(Error::ReservedValue);
        }

        let entry = Entry::new(key.to_vec(), value.to_vec(), unix_timestamp());

        let mut state = self.write_state()?;
        let loc = state.append(&self.path, &self.options, &entry)?;
        state.keydir.insert(entry.key, loc);
        Ok(())
    }

    /// Removes `key` by appending a tombstone and dropping it from the key
    /// directory. Deleting an absent key is a no-op.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        validate_key(key)?;

        let mut state = self.write_state()?;
        if !state.keydir.contains_key(key) {
            debug!("delete of absent key ignored");
            return Ok(());
        }

        let entry = Entry::tombstone(key.to_vec(), unix_timestamp());
        state.append(&self.path, &self.options, &entry)?;
        state.keydir.remove(key);
        Ok(())
    }
}
