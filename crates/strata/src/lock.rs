//! Host-wide advisory lock serializing volume operations.
//!
//! Volume operations are sequences of non-atomic steps across LVM, the unit
//! directory and the mount table. Dispatching entry points hold this lock so
//! that two invocations never interleave.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use rustix::fs::{FlockOperation, flock};
use strata_common::{StrataError, StrataResult};

/// An exclusive `flock` on the lock file, released on drop.
#[derive(Debug)]
pub struct VolumeLock {
    file: File,
    path: PathBuf,
}

impl VolumeLock {
    /// Try to take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Locked`] if another process holds it.
    pub fn acquire(path: &Path) -> StrataResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        match flock(&file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {}
            Err(rustix::io::Errno::WOULDBLOCK) => {
                return Err(StrataError::Locked {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(StrataError::Io(e.into())),
        }

        tracing::debug!(lock = %path.display(), "Acquired volume lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// The lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VolumeLock {
    fn drop(&mut self) {
        // Closing the file would release it as well.
        let _ = flock(&self.file, FlockOperation::Unlock);
        tracing::debug!(lock = %self.path.display(), "Released volume lock");
    }
}
