//! # Segment - append-only data and hint files
//!
//! A cask directory holds a sequence of numbered segments. Exactly one of
//! them is *active* and receives appends; every other segment is immutable
//! until merge rewrites its live records and deletes it.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 0000.datafile           entry | entry | entry | ...          │
//! │ 0001.datafile           entry | entry | ...                  │
//! │ 0002.datafile.merged    entry | entry | ...  (merge output)   │
//! │ 0002.hintfile           hint  | hint  | ...  (one per entry)  │
//! │ 0003.datafile           entry | ...          (active)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The record layouts are defined by the [`record`] crate. This crate owns
//! the files: naming, appending, point reads, sequential scans, sealing and
//! deletion.
//!
//! ## Example
//!
//! ```rust,no_run
//! use record::Entry;
//! use segment::Datafile;
//! use std::path::Path;
//!
//! let mut seg = Datafile::create(Path::new("/tmp/cask"), 0, false).unwrap();
//! let (offset, len) = seg.write(&Entry::new(b"k".to_vec(), b"v".to_vec(), 1)).unwrap();
//! let entry = seg.read_at(offset, len).unwrap();
//! assert_eq!(entry.value, b"v");
//! ```

mod datafile;
mod format;
mod hintfile;

pub use datafile::{Datafile, DatafileIter};
pub use format::{
    file_name, file_path, parse_file_name, FileKind, DATAFILE_SUFFIX, HINTFILE_SUFFIX,
    MERGED_DATAFILE_SUFFIX,
};
pub use hintfile::{HintReader, HintWriter};

use record::RecordError;
use thiserror::Error;

/// Errors raised while operating on segment files.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("segment {id} is read-only")]
    ReadOnly { id: u32 },

    #[error("segment reader lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests;
