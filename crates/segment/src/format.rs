//! Segment file naming.
//!
//! ```text
//! 0007.datafile          raw segment 7 (active or rotated out)
//! 0012.datafile.merged   merge output, always paired with 0012.hintfile
//! 0012.hintfile          hints for merged segment 12
//! ```
//!
//! Ids are zero-padded to four digits and grow wider past 9999, so callers
//! must order files by the parsed id, never by the file name.

use std::path::{Path, PathBuf};

/// Suffix of a raw segment.
pub const DATAFILE_SUFFIX: &str = ".datafile";
/// Suffix of a segment written by merge.
pub const MERGED_DATAFILE_SUFFIX: &str = ".datafile.merged";
/// Suffix of a hintfile.
pub const HINTFILE_SUFFIX: &str = ".hintfile";

/// The role a file plays in the database directory, as encoded in its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Data,
    MergedData,
    Hint,
}

impl FileKind {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            FileKind::Data => DATAFILE_SUFFIX,
            FileKind::MergedData => MERGED_DATAFILE_SUFFIX,
            FileKind::Hint => HINTFILE_SUFFIX,
        }
    }
}

/// Builds the file name for segment `id` of the given kind.
pub fn file_name(id: u32, kind: FileKind) -> String {
    format!("{:04}{}", id, kind.suffix())
}

/// Full path of segment `id` of the given kind inside `dir`.
pub fn file_path(dir: &Path, id: u32, kind: FileKind) -> PathBuf {
    dir.join(file_name(id, kind))
}

/// Parses a file name produced by [`file_name`].
///
/// Returns `None` for anything else (lock files, temp files, strays).
pub fn parse_file_name(name: &str) -> Option<(u32, FileKind)> {
    // The merged suffix contains the raw one, so test it first.
    let (stem, kind) = if let Some(stem) = name.strip_suffix(MERGED_DATAFILE_SUFFIX) {
        (stem, FileKind::MergedData)
    } else if let Some(stem) = name.strip_suffix(DATAFILE_SUFFIX) {
        (stem, FileKind::Data)
    } else if let Some(stem) = name.strip_suffix(HINTFILE_SUFFIX) {
        (stem, FileKind::Hint)
    } else {
        return None;
    };

    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().map(|id| (id, kind))
}
