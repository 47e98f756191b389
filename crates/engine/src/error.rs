use record::RecordError;
use segment::SegmentError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything a [`Db`](crate::Db) operation can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("path in use by another process: {0}")]
    PathInUse(PathBuf),

    #[error("key must not be empty")]
    EmptyKey,

    #[error("key too large: {len} bytes (max {max})")]
    KeyTooLarge { len: usize, max: usize },

    #[error("value too large: {len} bytes (max {max})")]
    ValueTooLarge { len: usize, max: usize },

    #[error("value is reserved for deletion markers")]
    ReservedValue,

    #[error("key not found")]
    KeyNotFound,

    #[error("corruption: {0}")]
    Corruption(String),

    #[error("checksum mismatch in segment {segment_id} at offset {offset}")]
    ChecksumMismatch { segment_id: u32, offset: u32 },

    #[error("segment {0} is read-only")]
    ReadOnlySegment(u32),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("offset {0} does not fit in 32 bits")]
    OffsetOverflow(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned")]
    LockPoisoned,
}

impl Error {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound)
    }

    /// True for on-disk damage, as opposed to caller or environment errors.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::ChecksumMismatch { .. })
    }
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Io(io) => Error::Io(io),
            RecordError::Eof => Error::Corruption("unexpected end of segment".into()),
            RecordError::Truncated => Error::Corruption("truncated record".into()),
            RecordError::Corrupt(msg) => Error::Corruption(msg),
            e @ RecordError::Oversized { .. } => Error::Encoding(e.to_string()),
        }
    }
}

impl From<SegmentError> for Error {
    fn from(e: SegmentError) -> Self {
        match e {
            SegmentError::Io(io) => Error::Io(io),
            SegmentError::Record(r) => r.into(),
            SegmentError::ReadOnly { id } => Error::ReadOnlySegment(id),
            SegmentError::LockPoisoned => Error::LockPoisoned,
        }
    }
}
