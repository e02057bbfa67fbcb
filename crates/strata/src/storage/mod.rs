//! Storage backend adapters.
//!
//! The backend owns the thin-provisioned volume catalog. Volumes are found
//! again by tag, so the backend is the source of truth for which paths are
//! managed.

mod lvm;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_common::{StrataResult, VolumeSize};

pub use lvm::LvmBackend;

/// A backing store entry as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    /// Volume name (the encoded identifier for managed volumes).
    pub name: String,
    /// Volume group the volume lives in.
    pub group: String,
    /// Block device path.
    pub path: PathBuf,
    /// Virtual size, if reported.
    pub size: Option<VolumeSize>,
    /// Tags attached to the volume.
    pub tags: Vec<String>,
}

impl VolumeRef {
    /// Whether the volume carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A thin-provisioned volume catalog.
///
/// Every failure is fatal for the calling operation; implementations do not
/// retry.
pub trait StorageBackend {
    /// Create a thin volume of `size` named `name`.
    fn create_volume(&self, name: &str, size: VolumeSize) -> StrataResult<VolumeRef>;

    /// Attach a tag to an existing volume.
    fn add_tag(&self, volume: &VolumeRef, tag: &str) -> StrataResult<()>;

    /// Delete a volume and all data on it.
    fn remove_volume(&self, name: &str) -> StrataResult<()>;

    /// List all volumes carrying `tag`.
    fn find_by_tag(&self, tag: &str) -> StrataResult<Vec<VolumeRef>>;

    /// Look up a single volume by name.
    fn lookup(&self, name: &str) -> StrataResult<VolumeRef>;
}
