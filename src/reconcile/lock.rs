//! Run lease held while splits are being reconciled.

use crate::error::{Error, Result};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock file; removed again when dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create `path`, failing with [`Error::Locked`] if it already exists.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        Self::acquire_with(path, |file| {
            writeln!(file, "pid={}", std::process::id())?;
            writeln!(file, "acquired_at={}", Utc::now().to_rfc3339())
        })
    }

    /// Like [`RunLock::acquire`], with `write_owner` filling in the new file.
    ///
    /// The file is removed again if `write_owner` fails.
    fn acquire_with<F>(path: impl AsRef<Path>, write_owner: F) -> Result<Self>
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        let path = path.as_ref().to_path_buf();

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::Locked(format!(
                    "{} exists; another run is in progress or a previous run crashed",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        // From here on, dropping `lock` removes the file.
        let lock = Self { path };
        write_owner(&mut file)?;
        debug!("Acquired run lock {}", lock.path.display());

        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released run lock {}", self.path.display()),
            Err(e) => warn!("Could not remove run lock {}: {}", self.path.display(), e),
        }
    }
}
