//! Cold-start path: rebuilds the key directory from the files on disk and
//! picks the active segment.
//!
//! Segments are processed in ascending id order so later writes override
//! earlier ones. A segment with a hintfile is loaded from its hints; a raw
//! segment is replayed record by record, with tombstones removing keys.

use keydir::{KeyDir, KeyDirEntry};
use log::{debug, info, warn};
use segment::{parse_file_name, Datafile, FileKind, HintReader};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::{to_u32, Error, Result, State};

/// Which files exist for one segment id.
#[derive(Debug, Default, Clone, Copy)]
struct Found {
    data: bool,
    merged: bool,
    hint: bool,
}

/// Lists the segment files in `dir`, keyed by id. Unrelated files are
/// ignored.
fn scan_dir(dir: &Path) -> Result<BTreeMap<u32, Found>> {
    let mut found: BTreeMap<u32, Found> = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some((id, kind)) = name.to_str().and_then(parse_file_name) else {
            continue;
        };
        let slot = found.entry(id).or_default();
        match kind {
            FileKind::Data => slot.data = true,
            FileKind::MergedData => slot.merged = true,
            FileKind::Hint => slot.hint = true,
        }
    }
    Ok(found)
}

/// Replays every record of a raw segment into `keydir` and returns the
/// offset just past the last whole record.
fn replay_segment(segment: &mut Datafile, keydir: &mut KeyDir) -> Result<u64> {
    let id = segment.id();
    let mut offset = 0u64;
    let mut records = 0u64;

    while let Some((entry, len)) = segment.read_next()? {
        if entry.is_tombstone() {
            keydir.remove(&entry.key);
        } else {
            let loc = KeyDirEntry {
                segment_id: id,
                value_offset: to_u32(offset)?,
                value_size: to_u32(len)?,
                timestamp: entry.timestamp,
            };
            keydir.insert(entry.key, loc);
        }
        offset += len;
        records += 1;
    }

    debug!("replayed segment {}: {} records, {} bytes", id, records, offset);
    Ok(offset)
}

/// Loads the hintfile paired with `segment` into `keydir`.
fn load_hints(dir: &Path, segment: &Datafile, keydir: &mut KeyDir) -> Result<()> {
    let id = segment.id();
    let end = segment.size();

    let hints = HintReader::open(dir, id)?.replay(|hint| -> Result<()> {
        let size = hint.record_size();
        if u64::from(hint.value_offset) + size > end {
            return Err(Error::Corruption(format!(
                "hint for segment {} points past its end (offset {}, size {})",
                id, hint.value_offset, size
            )));
        }
        let loc = KeyDirEntry {
            segment_id: id,
            value_offset: hint.value_offset,
            value_size: to_u32(size)?,
            timestamp: hint.timestamp,
        };
        keydir.insert(hint.key, loc);
        Ok(())
    })?;

    debug!("loaded {} hints for segment {}", hints, id);
    Ok(())
}

/// Rebuilds the engine state from the segment files in `dir`.
///
/// # Errors
///
/// Fails with `Corruption` when a record other than a torn tail cannot be
/// decoded, when a merged segment has no hintfile, or when an id is present
/// both as a raw and as a merged segment.
pub(crate) fn load(dir: &Path) -> Result<State> {
    let files = scan_dir(dir)?;
    let mut keydir = KeyDir::new();
    let mut immutable: BTreeMap<u32, Datafile> = BTreeMap::new();
    // Valid length of the most recent raw segment, for tail repair.
    let mut last_raw_end = None;

    for (&id, found) in &files {
        let merged = match (found.data, found.merged) {
            (true, true) => {
                return Err(Error::Corruption(format!(
                    "segment {} exists both raw and merged",
                    id
                )))
            }
            (false, false) => {
                warn!("ignoring hintfile {} without a segment", id);
                continue;
            }
            (_, merged) => merged,
        };

        let mut segment = Datafile::open(dir, id, merged)?;
        if found.hint {
            load_hints(dir, &segment, &mut keydir)?;
            last_raw_end = None;
        } else if merged {
            return Err(Error::Corruption(format!(
                "merged segment {} has no hintfile",
                id
            )));
        } else {
            last_raw_end = Some(replay_segment(&mut segment, &mut keydir)?);
        }
        immutable.insert(id, segment);
    }

    // The newest segment keeps receiving appends if it is raw; otherwise a
    // fresh one is started above it.
    let newest = immutable.keys().next_back().copied();
    let active = match (newest, last_raw_end) {
        (Some(id), Some(valid_end)) => {
            if let Some(seg) = immutable.remove(&id) {
                drop(seg);
            }
            let mut active = Datafile::create(dir, id, false)?;
            if valid_end < active.size() {
                warn!(
                    "truncating torn tail of {} from {} to {} bytes",
                    active.path().display(),
                    active.size(),
                    valid_end
                );
                active.truncate(valid_end)?;
            }
            active
        }
        (Some(id), None) => {
            let next = id
                .checked_add(1)
                .ok_or_else(|| Error::Corruption("segment id space exhausted".into()))?;
            Datafile::create(dir, next, false)?
        }
        (None, _) => Datafile::create(dir, 0, false)?,
    };

    if !immutable.is_empty() || !keydir.is_empty() {
        info!(
            "recovered {} keys from {} segments",
            keydir.len(),
            immutable.len() + 1
        );
    }

    Ok(State {
        keydir,
        max_id: active.id(),
        active,
        immutable,
        closed: false,
    })
}
