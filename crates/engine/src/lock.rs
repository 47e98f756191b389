//! Cross-process exclusivity for a database directory.

use fs2::FileExt;
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::{Error, Result};

/// Name of the lock file inside the database directory.
pub const LOCK_FILE: &str = "LOCK";

/// Exclusive advisory lock on `<dir>/LOCK`, held for the lifetime of a
/// [`Db`](crate::Db). Dropping it releases the lock.
#[derive(Debug)]
pub(crate) struct DirLock {
    file: File,
}

impl DirLock {
    /// Takes the lock without blocking and records the owner's pid in the
    /// lock file.
    ///
    /// # Errors
    ///
    /// `Error::PathInUse` if another handle already holds it.
    pub(crate) fn acquire(dir: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(dir.join(LOCK_FILE))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
                || e.kind() == std::io::ErrorKind::WouldBlock
            {
                warn!("database directory {} is locked", dir.display());
                return Err(Error::PathInUse(dir.to_path_buf()));
            }
            return Err(e.into());
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(Self { file })
    }

    pub(crate) fn release(self) -> Result<()> {
        self.file.unlock()?;
        Ok(())
    }
}
