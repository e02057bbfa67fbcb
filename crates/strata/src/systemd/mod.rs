//! systemd integration.
//!
//! This module handles:
//! - Rendering and removing mount unit files
//! - Driving the service manager (reload, enable/disable, start/stop)

mod control;
mod unit;

pub use control::{ServiceManager, Systemctl};
pub use unit::{DEFAULT_MOUNT_OPTIONS, MountUnit, MountUnitGenerator};
