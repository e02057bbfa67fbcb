//! Mount unit generation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use strata_common::StrataResult;

use crate::codec::NameCodec;

/// Mount options written when none are configured.
pub const DEFAULT_MOUNT_OPTIONS: &str = "discard";

/// A device-to-path mount definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountUnit {
    /// Block device to mount (`What=`).
    pub device: PathBuf,
    /// Mount point (`Where=`).
    pub target: PathBuf,
    /// Mount options (`Options=`).
    pub options: String,
}

impl MountUnit {
    /// Render the unit file.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "# Created by strata\n\
             [Mount]\n\
             What={}\n\
             Where={}\n\
             Options={}\n\
             SloppyOptions=yes\n\
             \n\
             [Install]\n\
             WantedBy=local-fs.target\n",
            self.device.display(),
            self.target.display(),
            self.options
        )
    }

    /// Parse the `[Mount]` section of a unit file.
    ///
    /// Returns `None` if `What=` or `Where=` is missing.
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        let mut device = None;
        let mut target = None;
        let mut options = String::new();
        let mut in_mount = false;

        for line in content.lines().map(str::trim) {
            if line.starts_with('[') {
                in_mount = line == "[Mount]";
                continue;
            }
            if !in_mount {
                continue;
            }
            match line.split_once('=') {
                Some(("What", value)) => device = Some(PathBuf::from(value)),
                Some(("Where", value)) => target = Some(PathBuf::from(value)),
                Some(("Options", value)) => options = value.to_string(),
                _ => {}
            }
        }

        Some(Self {
            device: device?,
            target: target?,
            options,
        })
    }
}

/// Writes and removes mount unit files in a unit directory.
///
/// Never talks to the service manager; callers reload and start units
/// themselves.
#[derive(Debug, Clone)]
pub struct MountUnitGenerator {
    unit_dir: PathBuf,
    codec: NameCodec,
    options: String,
}

impl MountUnitGenerator {
    /// Create a generator writing into `unit_dir`.
    pub fn new(unit_dir: impl Into<PathBuf>, codec: NameCodec) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            codec,
            options: DEFAULT_MOUNT_OPTIONS.to_string(),
        }
    }

    /// Set the mount options written into new units.
    #[must_use]
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    /// The unit directory.
    #[must_use]
    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    /// Unit name for a mount point.
    pub fn unit_name(&self, path: &Path) -> StrataResult<String> {
        self.codec.encode(path)
    }

    /// Unit file location for a mount point.
    pub fn unit_path(&self, path: &Path) -> StrataResult<PathBuf> {
        Ok(self.unit_dir.join(self.unit_name(path)?))
    }

    /// Write the unit mounting `device` on `path`, replacing any existing file.
    pub fn write(&self, path: &Path, device: &Path) -> StrataResult<PathBuf> {
        let unit_path = self.unit_path(path)?;
        let unit = MountUnit {
            device: device.to_path_buf(),
            target: path.to_path_buf(),
            options: self.options.clone(),
        };

        fs::create_dir_all(&self.unit_dir)?;
        fs::write(&unit_path, unit.render())?;

        tracing::debug!(
            unit = %unit_path.display(),
            device = %device.display(),
            target = %path.display(),
            "Wrote mount unit"
        );
        Ok(unit_path)
    }

    /// Delete the unit for `path`. A missing file is not an error.
    pub fn remove(&self, path: &Path) -> StrataResult<()> {
        let unit_path = self.unit_path(path)?;
        match fs::remove_file(&unit_path) {
            Ok(()) => {
                tracing::debug!(unit = %unit_path.display(), "Removed mount unit");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(unit = %unit_path.display(), "Mount unit already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read back the unit for `path`, if one exists.
    pub fn read(&self, path: &Path) -> StrataResult<Option<MountUnit>> {
        let unit_path = self.unit_path(path)?;
        match fs::read_to_string(&unit_path) {
            Ok(content) => Ok(MountUnit::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
