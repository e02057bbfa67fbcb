//! # Strata Volume Manager
//!
//! Strata turns directories of an image-based host into persistent volumes.
//! Each volume is a tagged LVM thin volume mounted over the directory by a
//! generated systemd mount unit, so its contents survive image updates.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use strata::config::StrataConfig;
//! use strata::volume::HostVolumeManager;
//! use strata_common::VolumeSize;
//!
//! # fn example() -> strata_common::StrataResult<()> {
//! let config = StrataConfig::load(Path::new("/etc/strata/strata.toml"), false)?;
//! let manager = HostVolumeManager::from_config(&config);
//!
//! // Move /var/log onto its own 4 GiB volume
//! manager.create(Path::new("/var/log"), VolumeSize::gibibytes(4))?;
//!
//! for path in manager.list()? {
//!     println!("{}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod filesystem;
pub mod hooks;
pub mod lock;
pub mod storage;
pub mod systemd;
pub mod volume;

pub use config::StrataConfig;
pub use volume::{HostVolumeManager, VolumeManager};
