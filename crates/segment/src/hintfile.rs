use log::warn;
use record::{decode_hint, encode_hint, Hint, RecordError};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::format::{file_path, FileKind};
use crate::SegmentError;

/// Buffered writer for the hintfile that accompanies a merged segment.
///
/// Hints are appended in the same order as the records they describe.
/// Call [`finish`](HintWriter::finish) once the merged segment is complete so
/// the hints reach disk before the original segments are deleted.
pub struct HintWriter {
    file: BufWriter<File>,
    count: u64,
}

impl HintWriter {
    /// Creates (truncating any stale copy) the hintfile for segment `id`.
    pub fn create(dir: &Path, id: u32) -> Result<Self, SegmentError> {
        let path = file_path(dir, id, FileKind::Hint);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            file: BufWriter::new(file),
            count: 0,
        })
    }

    /// Appends one hint and returns the number of bytes it took.
    pub fn write(&mut self, hint: &Hint) -> Result<u64, SegmentError> {
        let n = encode_hint(&mut self.file, hint)?;
        self.count += 1;
        Ok(n)
    }

    pub fn sync(&mut self) -> Result<(), SegmentError> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }

    /// Syncs and closes the hintfile, returning the number of hints written.
    pub fn finish(mut self) -> Result<u64, SegmentError> {
        self.sync()?;
        Ok(self.count)
    }
}

/// Sequential reader over a hintfile.
pub struct HintReader<R: Read> {
    rdr: BufReader<R>,
    read: u64,
}

impl HintReader<File> {
    /// Opens the hintfile for segment `id` in `dir`.
    pub fn open(dir: &Path, id: u32) -> Result<Self, SegmentError> {
        Self::open_path(&file_path(dir, id, FileKind::Hint))
    }

    pub fn open_path(path: &Path) -> Result<Self, SegmentError> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> HintReader<R> {
    pub fn from_reader(inner: R) -> Self {
        Self {
            rdr: BufReader::new(inner),
            read: 0,
        }
    }

    /// Decodes the next hint, or `Ok(None)` at the end of the file.
    ///
    /// A partial trailing hint is treated as the end of the file.
    pub fn next_hint(&mut self) -> Result<Option<Hint>, SegmentError> {
        match decode_hint(&mut self.rdr) {
            Ok((hint, n)) => {
                self.read += n;
                Ok(Some(hint))
            }
            Err(RecordError::Eof) => Ok(None),
            Err(RecordError::Truncated) => {
                warn!("hintfile ends with a partial hint at byte {}", self.read);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Feeds every hint to `apply` in file order and returns how many there
    /// were. Stops at the first error from `apply`.
    pub fn replay<F, E>(&mut self, mut apply: F) -> Result<u64, E>
    where
        F: FnMut(Hint) -> Result<(), E>,
        E: From<SegmentError>,
    {
        let mut n = 0u64;
        while let Some(hint) = self.next_hint()? {
            apply(hint)?;
            n += 1;
        }
        Ok(n)
    }
}
