//! Formatting and populating new volumes.

use std::path::Path;
use std::process::Command;

use strata_common::{StrataError, StrataResult};

use super::ScopedMount;

/// Filesystem created on new volumes when none is configured.
pub const DEFAULT_FILESYSTEM: &str = "ext4";

/// Prepares a freshly created volume before it is attached.
pub trait Provisioner {
    /// Create a filesystem on `device`.
    fn format(&self, device: &Path) -> StrataResult<()>;

    /// Copy the contents of `source` onto the filesystem on `device`.
    ///
    /// This is a one-shot copy, not an ongoing sync.
    fn populate(&self, source: &Path, device: &Path) -> StrataResult<()>;
}

/// [`Provisioner`] using `mkfs` and `rsync` on the host.
#[derive(Debug, Clone)]
pub struct HostProvisioner {
    filesystem: String,
}

impl HostProvisioner {
    /// Create a provisioner for `filesystem` (e.g. `ext4`).
    pub fn new(filesystem: impl Into<String>) -> Self {
        Self {
            filesystem: filesystem.into(),
        }
    }

    /// The filesystem type created by [`Provisioner::format`].
    #[must_use]
    pub fn filesystem(&self) -> &str {
        &self.filesystem
    }
}

impl Default for HostProvisioner {
    fn default() -> Self {
        Self::new(DEFAULT_FILESYSTEM)
    }
}

impl Provisioner for HostProvisioner {
    fn format(&self, device: &Path) -> StrataResult<()> {
        let program = format!("mkfs.{}", self.filesystem);
        tracing::debug!(device = %device.display(), %program, "Formatting volume");

        run(&program, device, Command::new(&program).arg(device))
    }

    fn populate(&self, source: &Path, device: &Path) -> StrataResult<()> {
        let mount = ScopedMount::new(device, &self.filesystem)?;

        // The trailing slash copies the contents of `source`, not the
        // directory itself.
        let from = format!("{}/", source.display());
        tracing::debug!(
            source = %from,
            target = %mount.target().display(),
            "Populating volume"
        );

        run(
            "rsync",
            device,
            Command::new("rsync")
                .arg("-aAXHx")
                .arg("--")
                .arg(&from)
                .arg(mount.target()),
        )?;

        mount.unmount()
    }
}

fn run(program: &str, device: &Path, command: &mut Command) -> StrataResult<()> {
    let output = command.output().map_err(|source| StrataError::Command {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(StrataError::Provision {
            device: device.to_path_buf(),
            message: format!(
                "{program} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(())
}
