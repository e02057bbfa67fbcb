//! Standard filesystem paths for Strata.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Default configuration file.
pub static STRATA_CONFIG: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("STRATA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/strata/strata.toml"))
});

/// Directory the generated mount units are written to.
pub static STRATA_UNIT_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("STRATA_UNIT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/systemd/system"))
});

/// Default runtime directory for Strata.
pub static STRATA_RUNTIME_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("STRATA_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/strata"))
});

/// Standard paths used by the volume manager.
#[derive(Debug, Clone)]
pub struct StrataPaths {
    /// Configuration file (default: /etc/strata/strata.toml).
    pub config: PathBuf,
    /// Mount unit directory (default: /etc/systemd/system).
    pub unit_dir: PathBuf,
    /// Runtime directory (default: /run/strata).
    pub runtime: PathBuf,
}

impl StrataPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths below a custom root, e.g. a test sandbox.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config: root.join("etc/strata/strata.toml"),
            unit_dir: root.join("etc/systemd/system"),
            runtime: root.join("run/strata"),
        }
    }

    /// Advisory lock serializing volume operations.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.runtime.join("volumes.lock")
    }

    /// Mount table of the current process.
    #[must_use]
    pub fn mountinfo() -> PathBuf {
        PathBuf::from("/proc/self/mountinfo")
    }
}

impl Default for StrataPaths {
    fn default() -> Self {
        Self {
            config: STRATA_CONFIG.clone(),
            unit_dir: STRATA_UNIT_DIR.clone(),
            runtime: STRATA_RUNTIME_DIR.clone(),
        }
    }
}
