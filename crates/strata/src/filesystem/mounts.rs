//! Mount operations.

use std::path::{Path, PathBuf};

use strata_common::{StrataError, StrataResult};
use tempfile::TempDir;

/// A block device mounted on a private temporary directory.
///
/// The device is unmounted and the directory removed when the guard is
/// dropped, on every exit path. Use [`ScopedMount::unmount`] to observe
/// unmount failures.
#[derive(Debug)]
pub struct ScopedMount {
    device: PathBuf,
    dir: Option<TempDir>,
}

impl ScopedMount {
    /// Mount `device` (formatted as `fstype`) on a fresh temporary directory.
    pub fn new(device: &Path, fstype: &str) -> StrataResult<Self> {
        let dir = tempfile::Builder::new().prefix("strata-mnt-").tempdir()?;
        mount(device, dir.path(), fstype)?;

        tracing::debug!(
            device = %device.display(),
            target = %dir.path().display(),
            "Scoped mount acquired"
        );

        Ok(Self {
            device: device.to_path_buf(),
            dir: Some(dir),
        })
    }

    /// The mount point.
    #[must_use]
    pub fn target(&self) -> &Path {
        self.dir.as_ref().map_or_else(|| Path::new(""), TempDir::path)
    }

    /// The mounted device.
    #[must_use]
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Unmount now and report failures.
    pub fn unmount(mut self) -> StrataResult<()> {
        self.release()
    }

    fn release(&mut self) -> StrataResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        if let Err(e) = unmount(dir.path()) {
            // Never delete the directory recursively while the device is
            // still mounted on it.
            let leaked = dir.keep();
            tracing::warn!(
                device = %self.device.display(),
                target = %leaked.display(),
                "Failed to release scoped mount, leaving mount point behind"
            );
            return Err(e);
        }

        tracing::debug!(device = %self.device.display(), "Scoped mount released");
        Ok(())
    }
}

impl Drop for ScopedMount {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Mount a block device.
#[cfg(target_os = "linux")]
pub fn mount(device: &Path, target: &Path, fstype: &str) -> StrataResult<()> {
    use rustix::mount::MountFlags;

    tracing::debug!(
        device = %device.display(),
        target = %target.display(),
        fstype,
        "Mounting filesystem"
    );

    rustix::mount::mount(device, target, fstype, MountFlags::empty(), None)
    .map_err(|e| errno_to_error("mount", e))
}

#[cfg(not(target_os = "linux"))]
pub fn mount(_device: &Path, _target: &Path, _fstype: &str) -> StrataResult<()> {
    Err(StrataError::Unsupported {
        feature: "mount".to_string(),
    })
}

/// Unmount a filesystem.
#[cfg(target_os = "linux")]
pub fn unmount(target: &Path) -> StrataResult<()> {
    use rustix::mount::{UnmountFlags, unmount};

    tracing::debug!(target = %target.display(), "Unmounting filesystem");

    unmount(target, UnmountFlags::empty()).map_err(|e| errno_to_error("unmount", e))
}

#[cfg(not(target_os = "linux"))]
pub fn unmount(_target: &Path) -> StrataResult<()> {
    Err(StrataError::Unsupported {
        feature: "unmount".to_string(),
    })
}

#[cfg(target_os = "linux")]
fn errno_to_error(operation: &str, errno: rustix::io::Errno) -> StrataError {
    if errno == rustix::io::Errno::PERM || errno == rustix::io::Errno::ACCESS {
        StrataError::PermissionDenied {
            operation: operation.to_string(),
        }
    } else {
        StrataError::Io(errno.into())
    }
}
