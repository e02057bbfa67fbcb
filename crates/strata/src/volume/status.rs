//! Reconciliation of the three sources of truth for a volume.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::systemd::MountUnit;

/// Lifecycle state of a path, as seen by the storage backend and the unit
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeState {
    /// No tagged backing volume; the path is not a volume.
    Absent,
    /// Tagged backing volume without a mount unit.
    Detached,
    /// Tagged backing volume with a mount unit.
    Attached,
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Detached => write!(f, "detached"),
            Self::Attached => write!(f, "attached"),
        }
    }
}

/// Backend, unit file and mount table view of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeStatus {
    /// The managed path.
    pub path: PathBuf,
    /// Backing volume name.
    pub identifier: String,
    /// Mount unit name.
    pub unit_name: String,
    /// Backing device, if the tagged volume exists.
    pub device: Option<PathBuf>,
    /// Whether a tagged backing volume exists.
    pub tagged: bool,
    /// The mount unit on disk, if any.
    #[serde(skip)]
    pub unit: Option<MountUnit>,
    /// Whether the path is currently a mount point.
    pub mounted: bool,
}

impl VolumeStatus {
    /// Lifecycle state. The backend tag decides whether the path is a volume.
    #[must_use]
    pub const fn state(&self) -> VolumeState {
        match (self.tagged, self.unit.is_some()) {
            (false, _) => VolumeState::Absent,
            (true, false) => VolumeState::Detached,
            (true, true) => VolumeState::Attached,
        }
    }

    /// Whether the unit on disk mounts the backing device on the path.
    #[must_use]
    pub fn unit_matches(&self) -> bool {
        match (&self.unit, &self.device) {
            (Some(unit), Some(device)) => unit.device == *device && unit.target == self.path,
            _ => false,
        }
    }

    /// Everything that disagrees between the three sources of truth.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match self.state() {
            VolumeState::Absent => {
                if self.unit.is_some() {
                    problems.push(format!(
                        "mount unit {} exists without a backing volume",
                        self.unit_name
                    ));
                }
            }
            VolumeState::Detached => {
                if self.mounted {
                    problems.push("path is mounted but has no mount unit".to_string());
                }
            }
            VolumeState::Attached => {
                if !self.unit_matches() {
                    problems.push(format!(
                        "mount unit {} does not mount the backing device on the path",
                        self.unit_name
                    ));
                }
                if !self.mounted {
                    problems.push("mount unit exists but the path is not mounted".to_string());
                }
            }
        }
        problems
    }

    /// Whether backend, unit file and mount table agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.problems().is_empty()
    }
}
