//! Filesystem operations for volumes.
//!
//! This module handles:
//! - Scoped mounts of block devices
//! - Formatting and populating new volumes
//! - Reading the live mount table

pub mod mountinfo;
mod mounts;
mod provision;

pub use mounts::{ScopedMount, mount, unmount};
pub use provision::{DEFAULT_FILESYSTEM, HostProvisioner, Provisioner};
