//! # Engine - log-structured key-value store
//!
//! Ties the [`record`], [`segment`] and [`keydir`] crates together into a
//! Bitcask-style database living in one directory.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                      DB                       │
//! │                                               │
//! │ write.rs → (size >= max?) rotate              │
//! │              |                                │
//! │              v                                │
//! │          active segment append → KeyDir upsert│
//! │                                               │
//! │ read.rs  → KeyDir lookup → segment read_at    │
//! │              → key + checksum verification    │
//! │                                               │
//! │ compaction.rs → live records of immutable     │
//! │   segments → merged segment + hintfile        │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                                |
//! |----------------|--------------------------------------------------------|
//! | `lib.rs`       | `Db` struct, `open`, `close`, accessors, `Debug`, `Drop` |
//! | [`recovery`]   | directory scan, hint loading, segment replay, tail repair |
//! | [`write`]      | `put()`, `delete()`, rotation                          |
//! | [`read`]       | `get()`, `has()`, `fold()`                             |
//! | [`compaction`] | `merge()`                                              |
//! | [`rpc`]        | status-coded `Put`/`Get` façade over a shared `Db`     |
//!
//! ## Locking
//!
//! One `RwLock` guards the key directory and the segment set. Lookups hold
//! it shared for their whole duration; `put`, `delete`, rotation and merge
//! hold it exclusively. A `LOCK` file in the directory keeps a second
//! process (or a second `Db` in this one) out.
//!
//! ## Example
//!
//! ```rust,no_run
//! use engine::{Db, Options};
//!
//! let db = Db::open("/tmp/cask", Options::default()).unwrap();
//! db.put(b"foo", b"bar").unwrap();
//! assert_eq!(db.get(b"foo").unwrap(), b"bar");
//! db.close().unwrap();
//! ```

mod compaction;
mod error;
mod lock;
mod read;
mod recovery;
pub mod rpc;
mod write;

pub use compaction::MergeSummary;
pub use config::Options;
pub use error::{Error, Result};
pub use keydir::{KeyDir, KeyDirEntry};
pub use lock::LOCK_FILE;
pub use record::{MAX_KEY_SIZE, MAX_VALUE_SIZE};

use lock::DirLock;
use log::info;
use segment::Datafile;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A snapshot of engine counters, as returned by [`Db::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub keys: usize,
    pub active_segment_id: u32,
    pub active_segment_size: u64,
    pub immutable_segments: usize,
    pub merged_segments: usize,
    pub max_segment_id: u32,
}

/// Everything guarded by the database's read-write lock.
pub(crate) struct State {
    pub(crate) keydir: KeyDir,
    /// The only writable segment.
    pub(crate) active: Datafile,
    /// Rotated-out and merged segments, by id.
    pub(crate) immutable: BTreeMap<u32, Datafile>,
    /// Highest segment id ever allocated in this directory.
    pub(crate) max_id: u32,
    pub(crate) closed: bool,
}

impl State {
    /// Resolves a segment id against the active and immutable sets.
    pub(crate) fn segment(&self, id: u32) -> Option<&Datafile> {
        if self.active.id() == id {
            Some(&self.active)
        } else {
            self.immutable.get(&id)
        }
    }

    /// Allocates the next segment id.
    pub(crate) fn next_id(&mut self) -> Result<u32> {
        let id = self
            .max_id
            .checked_add(1)
            .ok_or_else(|| Error::Corruption("segment id space exhausted".into()))?;
        self.max_id = id;
        Ok(id)
    }

    /// Retires the active segment and starts a fresh one above every
    /// allocated id.
    ///
    /// The retired segment moves to the immutable set, reopened read-only,
    /// or is deleted if it never received a record. All fallible work
    /// happens before the swap so a failure leaves the state untouched.
    pub(crate) fn replace_active(&mut self, dir: &Path) -> Result<()> {
        self.active.sync()?;
        let sealed = if self.active.is_empty() {
            None
        } else {
            Some(Datafile::open(dir, self.active.id(), self.active.is_merged())?)
        };

        let next = self.next_id()?;
        let fresh = Datafile::create(dir, next, false)?;
        let old = std::mem::replace(&mut self.active, fresh);

        match sealed {
            Some(seg) => {
                info!(
                    "segment {} sealed at {} bytes, active segment is now {}",
                    seg.id(),
                    seg.size(),
                    next
                );
                self.immutable.insert(seg.id(), seg);
            }
            None => old.remove()?,
        }
        Ok(())
    }
}

/// Converts a file offset or record length to the 32-bit form stored in the
/// key directory and hintfiles.
pub(crate) fn to_u32(v: u64) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::OffsetOverflow(v))
}

/// A Bitcask database rooted at one directory.
///
/// `Db` is `Send + Sync`; share it between threads with an `Arc`.
///
/// # Write Path
///
/// 1. Validate key and value sizes.
/// 2. Rotate the active segment if it is at or over `max_segment_size`.
/// 3. Append the record to the active segment.
/// 4. Point the key directory at the new record.
///
/// # Read Path
///
/// 1. Look the key up in the key directory.
/// 2. Read exactly that record from its segment.
/// 3. Check the stored key and the value checksum.
///
/// # Recovery
///
/// [`Db::open`] rebuilds the key directory from hintfiles where they exist
/// and by replaying raw segments otherwise, in ascending segment id order.
pub struct Db {
    path: PathBuf,
    options: Options,
    state: RwLock<State>,
    lock: Option<DirLock>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Db");
        d.field("path", &self.path).field("options", &self.options);
        match self.state.read() {
            Ok(s) => d
                .field("keys", &s.keydir.len())
                .field("active_segment", &s.active.id())
                .field("active_segment_size", &s.active.size())
                .field("immutable_segments", &s.immutable.len())
                .field("max_segment_id", &s.max_id),
            Err(_) => d.field("state", &"<poisoned>"),
        };
        d.finish()
    }
}

impl Db {
    /// Opens the database in `path`, creating the directory if needed.
    ///
    /// # Steps
    ///
    /// 1. Fail with `NotADirectory` if `path` exists and is not a directory.
    /// 2. Take the directory lock (`PathInUse` if already held).
    /// 3. Rebuild the key directory from the segments on disk.
    /// 4. Reopen the newest raw segment for appending, or create a new one.
    ///
    /// # Errors
    ///
    /// Any corruption found during recovery other than a torn tail fails the
    /// open.
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        match fs::metadata(&path) {
            Ok(md) if !md.is_dir() => return Err(Error::NotADirectory(path)),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(&path)?,
            Err(e) => return Err(e.into()),
        }

        let lock = DirLock::acquire(&path)?;
        let state = recovery::load(&path)?;

        info!(
            "opened {} ({} keys, {} immutable segments, active segment {})",
            path.display(),
            state.keydir.len(),
            state.immutable.len(),
            state.active.id()
        );

        Ok(Self {
            path,
            options,
            state: RwLock::new(state),
            lock: Some(lock),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn read_state(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| Error::LockPoisoned)
    }

    pub(crate) fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| Error::LockPoisoned)
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_state()?.keydir.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_state()?.keydir.is_empty())
    }

    pub fn stats(&self) -> Result<Stats> {
        let s = self.read_state()?;
        Ok(Stats {
            keys: s.keydir.len(),
            active_segment_id: s.active.id(),
            active_segment_size: s.active.size(),
            immutable_segments: s.immutable.len(),
            merged_segments: s.immutable.values().filter(|d| d.is_merged()).count(),
            max_segment_id: s.max_id,
        })
    }

    /// Flushes the active segment to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.write_state()?.active.sync()?;
        Ok(())
    }

    /// Closes every segment, syncing the active one, and releases the
    /// directory lock.
    pub fn close(mut self) -> Result<()> {
        let mut first_err: Option<Error> = None;
        {
            let mut state = self.write_state()?;
            state.closed = true;

            for (_, seg) in std::mem::take(&mut state.immutable) {
                if let Err(e) = seg.close() {
                    first_err.get_or_insert(e.into());
                }
            }
            if let Err(e) = state.active.sync() {
                first_err.get_or_insert(e.into());
            }
        }

        if let Some(lock) = self.lock.take() {
            if let Err(e) = lock.release() {
                first_err.get_or_insert(e);
            }
        }

        info!("closed {}", self.path.display());
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Best-effort sync on drop.
///
/// When a `Db` is dropped without [`Db::close`], the active segment is synced
/// so acknowledged writes reach disk. Errors are ignored because Drop cannot
/// propagate them; the directory lock is released when its file closes.
impl Drop for Db {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            if !state.closed {
                let _ = state.active.sync();
            }
        }
    }
}

#[cfg(test)]
mod tests;
