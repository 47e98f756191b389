//! # Record — on-disk record codec
//!
//! Serializes the two record kinds CaskKV keeps on disk:
//!
//! - **Data entries**, appended to segment files (`NNNN.datafile`).
//! - **Hints**, appended to hintfiles (`NNNN.hintfile`) written by merge.
//!
//! The codec is a pure transformation between records and byte streams; it
//! knows nothing about files, offsets, or rotation.
//!
//! ## Binary Record Format
//!
//! All integers are little-endian.
//!
//! ```text
//! Entry: [checksum: u32][timestamp: u32][key_len: u16][value_len: u32][key][value]
//! Hint:  [timestamp: u32][key_len: u16][value_len: u32][value_offset: u32][key]
//! ```
//!
//! `checksum` is the CRC-32 (IEEE) of the value bytes only.
//!
//! ## Example
//!
//! ```rust
//! use record::{decode_entry, encode_entry, Entry};
//!
//! let entry = Entry::new(b"hello".to_vec(), b"world".to_vec(), 1_700_000_000);
//! let mut buf = Vec::new();
//! let written = encode_entry(&mut buf, &entry).unwrap();
//!
//! let (decoded, read) = decode_entry(&mut buf.as_slice()).unwrap();
//! assert_eq!(written, read);
//! assert_eq!(decoded, entry);
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 512;
/// Maximum value length in bytes (2 MiB).
pub const MAX_VALUE_SIZE: usize = 2 * 1024 * 1024;

/// checksum(4) + timestamp(4) + key_len(2) + value_len(4)
pub const ENTRY_HEADER_SIZE: usize = 4 + 4 + 2 + 4;
/// timestamp(4) + key_len(2) + value_len(4) + value_offset(4)
pub const HINT_HEADER_SIZE: usize = 4 + 2 + 4 + 4;

/// Value written by a delete. Reserved: user values may never equal it.
pub const TOMBSTONE: &[u8] = b"__cask_tombstone__";

/// Errors produced while encoding or decoding records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended cleanly on a record boundary.
    #[error("end of data")]
    Eof,

    /// The stream ended in the middle of a record.
    #[error("truncated record")]
    Truncated,

    /// The bytes do not form a valid record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Attempt to encode a field larger than the format allows.
    #[error("{field} too large to encode: {len} bytes (max {max})")]
    Oversized {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl RecordError {
    /// Returns `true` when the stream simply ran out of bytes, whether on a
    /// record boundary or partway through one.
    #[must_use]
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, RecordError::Eof | RecordError::Truncated)
    }
}

/// Current unix time in seconds, saturating at `u32::MAX`.
pub fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// CRC-32 (IEEE) of a value.
pub fn checksum(value: &[u8]) -> u32 {
    crc32fast::hash(value)
}

/// One logical key-value record.
///
/// `key_len` and `value_len` on disk are derived from the byte vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// CRC-32 of `value` as stored on disk.
    pub checksum: u32,
    /// Unix seconds at write time.
    pub timestamp: u32,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Entry {
    /// Builds an entry with a freshly computed checksum.
    pub fn new(key: Vec<u8>, value: Vec<u8>, timestamp: u32) -> Self {
        Self {
            checksum: checksum(&value),
            timestamp,
            key,
            value,
        }
    }

    /// Builds a deletion marker for `key`.
    pub fn tombstone(key: Vec<u8>, timestamp: u32) -> Self {
        Self::new(key, TOMBSTONE.to_vec(), timestamp)
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value == TOMBSTONE
    }

    /// Returns `true` if the stored checksum matches the value bytes.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.checksum == checksum(&self.value)
    }

    /// Number of bytes this entry occupies once encoded.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        ENTRY_HEADER_SIZE + self.key.len() + self.value.len()
    }

    /// Derives the hint describing this entry stored at `value_offset`.
    pub fn to_hint(&self, value_offset: u32) -> Hint {
        Hint {
            timestamp: self.timestamp,
            value_size: self.value.len() as u32,
            value_offset,
            key: self.key.clone(),
        }
    }
}

/// Compact index record: where an entry's bytes live inside a merged segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub timestamp: u32,
    /// Length of the value (not of the whole entry).
    pub value_size: u32,
    /// Offset of the entry's first byte inside its segment.
    pub value_offset: u32,
    pub key: Vec<u8>,
}

impl Hint {
    /// Length of the data entry this hint points at.
    #[must_use]
    pub fn record_size(&self) -> u64 {
        (ENTRY_HEADER_SIZE + self.key.len()) as u64 + u64::from(self.value_size)
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HINT_HEADER_SIZE + self.key.len()
    }
}

fn check_key(key: &[u8]) -> Result<(), RecordError> {
    if key.len() > MAX_KEY_SIZE {
        return Err(RecordError::Oversized {
            field: "key",
            len: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

/// Encodes `entry` into `w`, returning the exact number of bytes written.
///
/// The header is assembled on the stack and the record is handed to the
/// writer in three `write_all` calls; pass a `Vec<u8>` to get a single
/// contiguous frame.
pub fn encode_entry<W: Write>(w: &mut W, entry: &Entry) -> Result<u64, RecordError> {
    check_key(&entry.key)?;
    if entry.value.len() > MAX_VALUE_SIZE {
        return Err(RecordError::Oversized {
            field: "value",
            len: entry.value.len(),
            max: MAX_VALUE_SIZE,
        });
    }

    let mut header = [0u8; ENTRY_HEADER_SIZE];
    {
        let mut h = &mut header[..];
        h.write_u32::<LittleEndian>(entry.checksum)?;
        h.write_u32::<LittleEndian>(entry.timestamp)?;
        h.write_u16::<LittleEndian>(entry.key.len() as u16)?;
        h.write_u32::<LittleEndian>(entry.value.len() as u32)?;
    }

    w.write_all(&header)?;
    w.write_all(&entry.key)?;
    w.write_all(&entry.value)?;

    Ok(entry.encoded_len() as u64)
}

/// Reads as many bytes as possible into `buf`, returning the count.
///
/// Unlike `read_exact`, a short read tells us how far the stream got, which
/// separates a clean end of stream from a torn record.
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match r.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(read)
}

fn read_header<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N], RecordError> {
    let mut header = [0u8; N];
    match fill(r, &mut header)? {
        0 => Err(RecordError::Eof),
        n if n < N => Err(RecordError::Truncated),
        _ => Ok(header),
    }
}

fn read_body<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>, RecordError> {
    let mut buf = vec![0u8; len];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(RecordError::Truncated),
        Err(e) => Err(RecordError::Io(e)),
    }
}

struct EntryHeader {
    checksum: u32,
    timestamp: u32,
    key_len: usize,
    value_len: usize,
}

fn parse_entry_header(mut h: &[u8]) -> Result<EntryHeader, RecordError> {
    let checksum = h.read_u32::<LittleEndian>()?;
    let timestamp = h.read_u32::<LittleEndian>()?;
    let key_len = h.read_u16::<LittleEndian>()? as usize;
    let value_len = h.read_u32::<LittleEndian>()? as usize;

    // Reject absurd sizes before allocating.
    if key_len > MAX_KEY_SIZE {
        return Err(RecordError::Corrupt(format!(
            "key_len {} exceeds maximum {}",
            key_len, MAX_KEY_SIZE
        )));
    }
    if value_len > MAX_VALUE_SIZE {
        return Err(RecordError::Corrupt(format!(
            "value_len {} exceeds maximum {}",
            value_len, MAX_VALUE_SIZE
        )));
    }

    Ok(EntryHeader {
        checksum,
        timestamp,
        key_len,
        value_len,
    })
}

/// Decodes the next entry from a stream, returning it with its encoded length.
///
/// # Termination
///
/// - **No bytes left** -> `Err(RecordError::Eof)`.
/// - **Partial record** -> `Err(RecordError::Truncated)`.
/// - **Lengths over the limits** -> `Err(RecordError::Corrupt(..))`.
///
/// The checksum is not verified here; see [`Entry::verify`].
pub fn decode_entry<R: Read>(r: &mut R) -> Result<(Entry, u64), RecordError> {
    let header = read_header::<R, ENTRY_HEADER_SIZE>(r)?;
    let h = parse_entry_header(&header)?;

    let key = read_body(r, h.key_len)?;
    let value = read_body(r, h.value_len)?;

    let entry = Entry {
        checksum: h.checksum,
        timestamp: h.timestamp,
        key,
        value,
    };
    let len = entry.encoded_len() as u64;
    Ok((entry, len))
}

/// Decodes an entry from a buffer holding exactly one encoded record.
///
/// Used for point reads, where the record length is already known from the
/// key directory. A buffer whose length disagrees with its header is corrupt.
pub fn decode_entry_from_buffer(buf: &[u8]) -> Result<Entry, RecordError> {
    if buf.len() < ENTRY_HEADER_SIZE {
        return Err(RecordError::Truncated);
    }
    let h = parse_entry_header(&buf[..ENTRY_HEADER_SIZE])?;

    let expected = ENTRY_HEADER_SIZE + h.key_len + h.value_len;
    if buf.len() != expected {
        return Err(RecordError::Corrupt(format!(
            "buffer holds {} bytes but header describes {}",
            buf.len(),
            expected
        )));
    }

    let body = &buf[ENTRY_HEADER_SIZE..];
    let (key, value) = body.split_at(h.key_len);
    Ok(Entry {
        checksum: h.checksum,
        timestamp: h.timestamp,
        key: key.to_vec(),
        value: value.to_vec(),
    })
}

/// Encodes `hint` into `w`, returning the exact number of bytes written.
pub fn encode_hint<W: Write>(w: &mut W, hint: &Hint) -> Result<u64, RecordError> {
    check_key(&hint.key)?;

    let mut header = [0u8; HINT_HEADER_SIZE];
    {
        let mut h = &mut header[..];
        h.write_u32::<LittleEndian>(hint.timestamp)?;
        h.write_u16::<LittleEndian>(hint.key.len() as u16)?;
        h.write_u32::<LittleEndian>(hint.value_size)?;
        h.write_u32::<LittleEndian>(hint.value_offset)?;
    }

    w.write_all(&header)?;
    w.write_all(&hint.key)?;

    Ok(hint.encoded_len() as u64)
}

/// Decodes the next hint from a stream, returning it with its encoded length.
///
/// Termination rules match [`decode_entry`].
pub fn decode_hint<R: Read>(r: &mut R) -> Result<(Hint, u64), RecordError> {
    let header = read_header::<R, HINT_HEADER_SIZE>(r)?;
    let mut h = &header[..];
    let timestamp = h.read_u32::<LittleEndian>()?;
    let key_len = h.read_u16::<LittleEndian>()? as usize;
    let value_size = h.read_u32::<LittleEndian>()?;
    let value_offset = h.read_u32::<LittleEndian>()?;

    if key_len > MAX_KEY_SIZE {
        return Err(RecordError::Corrupt(format!(
            "hint key_len {} exceeds maximum {}",
            key_len, MAX_KEY_SIZE
        )));
    }

    let key = read_body(r, key_len)?;
    let hint = Hint {
        timestamp,
        value_size,
        value_offset,
        key,
    };
    let len = hint.encoded_len() as u64;
    Ok((hint, len))
}
