//! Volume manager configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::{StrataError, StrataPaths, StrataResult};

use crate::codec::NameCodec;
use crate::filesystem::DEFAULT_FILESYSTEM;
use crate::systemd::{DEFAULT_MOUNT_OPTIONS, MountUnitGenerator};

/// Tag marking backing volumes owned by the volume manager.
pub const DEFAULT_VOLUME_TAG: &str = "imgbased:volume";

/// How mount unit files are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitNaming {
    /// systemd path escaping (`foo-bar` becomes `foo\x2dbar`).
    #[default]
    Systemd,
    /// LVM style escaping (`foo-bar` becomes `foo--bar`).
    Legacy,
}

impl UnitNaming {
    /// The codec producing unit names.
    #[must_use]
    pub const fn codec(self) -> NameCodec {
        match self {
            Self::Systemd => NameCodec::systemd_mount(),
            Self::Legacy => NameCodec::legacy_mount(),
        }
    }
}

/// Volume manager configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrataConfig {
    /// Volume group holding the thin pool.
    pub volume_group: String,
    /// Thin pool new volumes are allocated from.
    pub thin_pool: String,
    /// Tag attached to every managed volume.
    pub volume_tag: String,
    /// Directory mount units are written to.
    pub unit_dir: PathBuf,
    /// Filesystem created on new volumes.
    pub filesystem: String,
    /// Mount options written into units.
    pub mount_options: String,
    /// Unit file naming scheme.
    pub unit_naming: UnitNaming,
    /// Advisory lock serializing volume operations.
    pub lock_file: PathBuf,
    /// Mount table consulted by status checks.
    pub mountinfo: PathBuf,
}

impl Default for StrataConfig {
    fn default() -> Self {
        let paths = StrataPaths::new();
        Self {
            volume_group: "hostvg".to_string(),
            thin_pool: "pool00".to_string(),
            volume_tag: DEFAULT_VOLUME_TAG.to_string(),
            unit_dir: paths.unit_dir.clone(),
            filesystem: DEFAULT_FILESYSTEM.to_string(),
            mount_options: DEFAULT_MOUNT_OPTIONS.to_string(),
            unit_naming: UnitNaming::default(),
            lock_file: paths.lock_file(),
            mountinfo: StrataPaths::mountinfo(),
        }
    }
}

impl StrataConfig {
    /// Load the configuration file at `path`.
    ///
    /// A missing file yields the defaults unless `required` is set.
    pub fn load(path: &Path, required: bool) -> StrataResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), "Loaded configuration");
                Self::from_toml(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(StrataError::Config {
                message: format!("cannot read {}: {e}", path.display()),
            }),
        }
    }

    /// Parse a TOML configuration.
    pub fn from_toml(content: &str) -> StrataResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that cannot be caught by the parser.
    pub fn validate(&self) -> StrataResult<()> {
        let non_empty = [
            ("volume_group", &self.volume_group),
            ("thin_pool", &self.thin_pool),
            ("volume_tag", &self.volume_tag),
            ("filesystem", &self.filesystem),
        ];
        for (key, value) in non_empty {
            if value.trim().is_empty() {
                return Err(StrataError::Config {
                    message: format!("{key} must not be empty"),
                });
            }
        }
        Ok(())
    }

    /// Use a different volume group.
    #[must_use]
    pub fn with_volume_group(mut self, volume_group: impl Into<String>) -> Self {
        self.volume_group = volume_group.into();
        self
    }

    /// Use a different thin pool.
    #[must_use]
    pub fn with_thin_pool(mut self, thin_pool: impl Into<String>) -> Self {
        self.thin_pool = thin_pool.into();
        self
    }

    /// Write units into a different directory.
    #[must_use]
    pub fn with_unit_dir(mut self, unit_dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = unit_dir.into();
        self
    }

    /// Use a different lock file.
    #[must_use]
    pub fn with_lock_file(mut self, lock_file: impl Into<PathBuf>) -> Self {
        self.lock_file = lock_file.into();
        self
    }

    /// Read mounts from a different mount table.
    #[must_use]
    pub fn with_mountinfo(mut self, mountinfo: impl Into<PathBuf>) -> Self {
        self.mountinfo = mountinfo.into();
        self
    }

    /// Use a different unit naming scheme.
    #[must_use]
    pub fn with_unit_naming(mut self, unit_naming: UnitNaming) -> Self {
        self.unit_naming = unit_naming;
        self
    }

    /// The mount unit generator for this configuration.
    #[must_use]
    pub fn unit_generator(&self) -> MountUnitGenerator {
        MountUnitGenerator::new(&self.unit_dir, self.unit_naming.codec())
            .with_options(&self.mount_options)
    }
}
