//! Compaction: rewrites the live records of every immutable segment into
//! merged segments with hintfiles, then deletes the originals.
//!
//! Runs under the exclusive lock. Segments are processed in ascending id
//! order and each original is deleted only after its live records have been
//! synced to the merged output. Tombstones are never copied; the key they
//! delete is already absent from the key directory, and every older value
//! for it sits in a segment compacted earlier in the same pass.

use keydir::KeyDirEntry;
use log::{debug, info};
use segment::{Datafile, HintWriter};
use std::path::Path;

use crate::{to_u32, Db, Options, Result, State};

/// What one call to [`Db::merge`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Original segments rewritten and deleted.
    pub segments_compacted: usize,
    /// Merged segments created.
    pub segments_written: usize,
    /// Live records copied forward.
    pub records_kept: u64,
    /// Stale records and tombstones discarded.
    pub records_dropped: u64,
}

/// The merged segment currently being filled, with its hintfile.
struct MergeOutput {
    segment: Datafile,
    hints: HintWriter,
}

impl MergeOutput {
    fn create(dir: &Path, id: u32) -> Result<Self> {
        Ok(Self {
            segment: Datafile::create(dir, id, true)?,
            hints: HintWriter::create(dir, id)?,
        })
    }

    fn sync(&mut self) -> Result<()> {
        self.segment.sync()?;
        self.hints.sync()?;
        Ok(())
    }

    /// Completes the hintfile, seals the segment and hands it to the
    /// immutable set.
    fn finish_into(self, state: &mut State) -> Result<()> {
        let MergeOutput { segment, hints } = self;
        let hinted = hints.finish()?;
        let sealed = segment.seal()?;
        debug!(
            "merged segment {} sealed ({} records, {} bytes)",
            sealed.id(),
            hinted,
            sealed.size()
        );
        state.immutable.insert(sealed.id(), sealed);
        Ok(())
    }
}

/// Copies the live records of `segment` into the merge output, starting a
/// new output whenever the current one is full.
fn compact_segment(
    dir: &Path,
    options: &Options,
    state: &mut State,
    segment: &Datafile,
    out: &mut Option<MergeOutput>,
    summary: &mut MergeSummary,
) -> Result<()> {
    let id = segment.id();

    for item in segment.iter()? {
        let (entry, offset) = item?;
        if entry.is_tombstone() || !state.keydir.points_at(&entry.key, id, offset) {
            summary.records_dropped += 1;
            continue;
        }

        let output = match out.take() {
            Some(current) if current.segment.size() < options.max_merge_segment_size => {
                out.insert(current)
            }
            full => {
                if let Some(full) = full {
                    full.finish_into(state)?;
                }
                let fresh = MergeOutput::create(dir, state.next_id()?)?;
                summary.segments_written += 1;
                out.insert(fresh)
            }
        };

        let value_offset = to_u32(output.segment.size())?;
        let (_, len) = output.segment.write(&entry)?;
        output.hints.write(&entry.to_hint(value_offset))?;

        let loc = KeyDirEntry {
            segment_id: output.segment.id(),
            value_offset,
            value_size: to_u32(len)?,
            timestamp: entry.timestamp,
        };
        state.keydir.insert(entry.key, loc);
        summary.records_kept += 1;
    }

    // Live records must be durable before the original goes away.
    if let Some(output) = out.as_mut() {
        output.sync()?;
    }
    Ok(())
}

fn compact_all(
    dir: &Path,
    options: &Options,
    state: &mut State,
    out: &mut Option<MergeOutput>,
    summary: &mut MergeSummary,
) -> Result<()> {
    let ids: Vec<u32> = state.immutable.keys().copied().collect();

    for id in ids {
        let Some(segment) = state.immutable.remove(&id) else {
            continue;
        };
        if let Err(e) = compact_segment(dir, options, state, &segment, out, summary) {
            state.immutable.insert(id, segment);
            return Err(e);
        }
        segment.remove()?;
        summary.segments_compacted += 1;
        debug!("segment {} compacted and removed", id);
    }
    Ok(())
}

impl Db {
    /// Reclaims the space held by stale records and tombstones in immutable
    /// segments. The active segment is never compacted.
    ///
    /// # Steps
    ///
    /// 1. For each immutable segment in ascending id order, copy every record
    ///    the key directory still points at into a merged segment (created
    ///    on first use, id above all others) and its hintfile, repointing the
    ///    key directory as it goes.
    /// 2. Sync the output, then delete the original segment.
    /// 3. Seal the last merged segment.
    /// 4. If merged ids now exceed the active segment's id, start a new
    ///    active segment above them so recovery replays it last.
    ///
    /// Steps 3 and 4 also run when step 1 or 2 fails, so the key directory
    /// and the segment set stay consistent.
    pub fn merge(&self) -> Result<MergeSummary> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let mut summary = MergeSummary::default();

        if state.immutable.is_empty() {
            return Ok(summary);
        }

        let mut out = None;
        let compacted = compact_all(&self.path, &self.options, state, &mut out, &mut summary);
        let finished = match out.take() {
            Some(output) => output.finish_into(state),
            None => Ok(()),
        };
        let rehomed = if state.max_id > state.active.id() {
            state.replace_active(&self.path)
        } else {
            Ok(())
        };

        compacted?;
        finished?;
        rehomed?;

        info!(
            "merge complete: {} segments compacted into {}, {} records kept, {} dropped",
            summary.segments_compacted,
            summary.segments_written,
            summary.records_kept,
            summary.records_dropped
        );
        Ok(summary)
    }
}
