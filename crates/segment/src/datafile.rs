use log::warn;
use record::{
    decode_entry, decode_entry_from_buffer, encode_entry, Entry, RecordError, ENTRY_HEADER_SIZE,
    MAX_KEY_SIZE, MAX_VALUE_SIZE,
};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::format::{file_path, FileKind};
use crate::SegmentError;

/// Largest record a point read will allocate for. Prevents OOM on a corrupt
/// key directory entry.
const MAX_RECORD_BYTES: u64 = (ENTRY_HEADER_SIZE + MAX_KEY_SIZE + MAX_VALUE_SIZE) as u64;

/// One append-only segment file.
///
/// A datafile is either **writable** (the active segment, or a merge output
/// being filled) or **read-only** (rotated out, or reopened on recovery).
/// Both flavours support random reads through [`read_at`](Datafile::read_at)
/// and sequential reads through [`read_next`](Datafile::read_next) and
/// [`iter`](Datafile::iter); only writable ones accept [`write`](Datafile::write).
///
/// Random reads go through their own file handle behind a `Mutex`, so they
/// can be served through `&self` without disturbing the sequential cursor.
pub struct Datafile {
    id: u32,
    merged: bool,
    path: PathBuf,
    /// Append handle; `None` for read-only segments.
    appender: Option<File>,
    /// Handle used by point reads.
    reader: Mutex<File>,
    /// Sequential cursor used by `read_next`.
    cursor: BufReader<File>,
    /// Bytes on disk, which is also the offset of the next append.
    size: u64,
    /// Reusable scratch buffer so each append is a single `write_all`.
    buf: Vec<u8>,
}

impl std::fmt::Debug for Datafile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datafile")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("path", &self.path)
            .field("writable", &self.is_writable())
            .field("size", &self.size)
            .finish()
    }
}

fn kind_for(merged: bool) -> FileKind {
    if merged {
        FileKind::MergedData
    } else {
        FileKind::Data
    }
}

impl Datafile {
    /// Opens (or creates) segment `id` in `dir` for appending.
    pub fn create(dir: &Path, id: u32, merged: bool) -> Result<Self, SegmentError> {
        let path = file_path(dir, id, kind_for(merged));
        let appender = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        let size = appender.metadata()?.len();
        Self::from_parts(id, merged, path, Some(appender), size)
    }

    /// Opens an existing segment `id` in `dir` read-only.
    pub fn open(dir: &Path, id: u32, merged: bool) -> Result<Self, SegmentError> {
        Self::open_read_only(file_path(dir, id, kind_for(merged)), id, merged)
    }

    fn open_read_only(path: PathBuf, id: u32, merged: bool) -> Result<Self, SegmentError> {
        let size = fs::metadata(&path)?.len();
        Self::from_parts(id, merged, path, None, size)
    }

    fn from_parts(
        id: u32,
        merged: bool,
        path: PathBuf,
        appender: Option<File>,
        size: u64,
    ) -> Result<Self, SegmentError> {
        let reader = File::open(&path)?;
        let cursor = BufReader::new(File::open(&path)?);
        Ok(Self {
            id,
            merged,
            path,
            appender,
            reader: Mutex::new(reader),
            cursor,
            size,
            buf: Vec::with_capacity(256),
        })
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns `true` for segments produced by merge.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        kind_for(self.merged)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length on disk; also the offset the next append lands at.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.appender.is_some()
    }

    /// Appends `entry`, returning `(offset_before_write, bytes_written)`.
    ///
    /// The record is encoded into a scratch buffer and handed to the OS in
    /// one `write_all`, so it is immediately visible to `read_at`.
    ///
    /// # Errors
    ///
    /// `SegmentError::ReadOnly` on a read-only segment; encoding and I/O
    /// errors otherwise. A failed append is cut back off the file so the
    /// next one still lands at [`size`](Datafile::size).
    pub fn write(&mut self, entry: &Entry) -> Result<(u64, u64), SegmentError> {
        let file = self
            .appender
            .as_mut()
            .ok_or(SegmentError::ReadOnly { id: self.id })?;

        self.buf.clear();
        let written = encode_entry(&mut self.buf, entry)?;
        if let Err(e) = file.write_all(&self.buf) {
            self.discard_partial_append();
            return Err(e.into());
        }

        let offset = self.size;
        self.size += written;
        Ok((offset, written))
    }

    /// Drops whatever part of a failed append reached the file.
    ///
    /// If the file cannot be cut back, `size` follows the real length so
    /// offsets handed out afterwards still match where records land.
    pub(crate) fn discard_partial_append(&mut self) {
        let Some(file) = self.appender.as_mut() else {
            return;
        };
        if let Err(e) = file.set_len(self.size) {
            warn!(
                "segment {}: cannot drop partial append at {}: {}",
                self.id, self.size, e
            );
            match file.metadata() {
                Ok(md) => self.size = md.len(),
                Err(e) => warn!("segment {}: cannot stat after failed append: {}", self.id, e),
            }
        }
    }

    /// Decodes the next entry from the sequential cursor.
    ///
    /// Returns `Ok(None)` at the end of the segment. A partial record at the
    /// tail (a torn append) also ends the scan.
    pub fn read_next(&mut self) -> Result<Option<(Entry, u64)>, SegmentError> {
        match decode_entry(&mut self.cursor) {
            Ok(pair) => Ok(Some(pair)),
            Err(RecordError::Eof) => Ok(None),
            Err(RecordError::Truncated) => {
                warn!("segment {} ends with a partial record", self.id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Decodes the record of exactly `size` bytes starting at `offset`.
    ///
    /// Does not move the sequential cursor. The checksum is not verified;
    /// that is the caller's decision.
    pub fn read_at(&self, offset: u64, size: u64) -> Result<Entry, SegmentError> {
        if size > MAX_RECORD_BYTES {
            return Err(RecordError::Corrupt(format!(
                "record size {} at offset {} exceeds maximum {}",
                size, offset, MAX_RECORD_BYTES
            ))
            .into());
        }

        let mut buf = vec![0u8; size as usize];
        {
            let mut f = self.reader.lock().map_err(|_| SegmentError::LockPoisoned)?;
            f.seek(SeekFrom::Start(offset))?;
            f.read_exact(&mut buf).map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => SegmentError::Record(RecordError::Truncated),
                _ => SegmentError::Io(e),
            })?;
        }

        Ok(decode_entry_from_buffer(&buf)?)
    }

    /// Returns a fresh forward iterator over `(entry, offset)` pairs.
    ///
    /// Each call starts again from offset 0 on its own file handle and stops
    /// at the segment size observed when the iterator was created.
    pub fn iter(&self) -> Result<DatafileIter, SegmentError> {
        let file = File::open(&self.path)?;
        Ok(DatafileIter {
            id: self.id,
            rdr: BufReader::new(file),
            offset: 0,
            end: self.size,
            done: false,
        })
    }

    /// Flushes appended data to stable storage. No-op when read-only.
    pub fn sync(&mut self) -> Result<(), SegmentError> {
        if let Some(f) = self.appender.as_mut() {
            f.flush()?;
            f.sync_all()?;
        }
        Ok(())
    }

    /// Cuts the segment back to `len` bytes, dropping a torn tail.
    pub fn truncate(&mut self, len: u64) -> Result<(), SegmentError> {
        let file = self
            .appender
            .as_mut()
            .ok_or(SegmentError::ReadOnly { id: self.id })?;
        file.set_len(len)?;
        file.sync_all()?;
        self.size = len;
        Ok(())
    }

    /// Syncs and releases the file handles.
    pub fn close(mut self) -> Result<(), SegmentError> {
        self.sync()
    }

    /// Closes a writable segment and reopens it read-only.
    pub fn seal(mut self) -> Result<Self, SegmentError> {
        self.sync()?;
        let (id, merged, path) = (self.id, self.merged, self.path.clone());
        drop(self);
        Self::open_read_only(path, id, merged)
    }

    /// Closes the segment and deletes its file.
    pub fn remove(mut self) -> Result<(), SegmentError> {
        self.sync()?;
        let path = self.path.clone();
        drop(self);
        fs::remove_file(&path)?;
        Ok(())
    }
}

/// Forward iterator over one segment, yielding each entry with the absolute
/// offset of its first byte.
///
/// Finite: it ends at the segment size captured by [`Datafile::iter`], at a
/// torn tail, or after the first decode error.
pub struct DatafileIter {
    id: u32,
    rdr: BufReader<File>,
    offset: u64,
    end: u64,
    done: bool,
}

impl Iterator for DatafileIter {
    type Item = Result<(Entry, u64), SegmentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.end {
            return None;
        }

        match decode_entry(&mut self.rdr) {
            Ok((entry, len)) => {
                let at = self.offset;
                self.offset += len;
                Some(Ok((entry, at)))
            }
            Err(e) if e.is_end_of_data() => {
                if matches!(e, RecordError::Truncated) {
                    warn!(
                        "segment {} iteration stopped at partial record (offset {})",
                        self.id, self.offset
                    );
                }
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}
