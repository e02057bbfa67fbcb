//! Service manager control.

use std::process::Command;

use strata_common::{StrataError, StrataResult};

/// Controls units through the host's service manager.
///
/// Every call blocks until the service manager is done. Enabling, disabling,
/// starting or stopping a unit that is already in the requested state must
/// succeed.
pub trait ServiceManager {
    /// Reload unit definitions from disk.
    fn reload(&self) -> StrataResult<()>;

    /// Enable a unit.
    fn enable(&self, unit: &str) -> StrataResult<()>;

    /// Disable a unit.
    fn disable(&self, unit: &str) -> StrataResult<()>;

    /// Start a unit.
    fn start(&self, unit: &str) -> StrataResult<()>;

    /// Stop a unit.
    fn stop(&self, unit: &str) -> StrataResult<()>;
}

/// [`ServiceManager`] backed by `systemctl`.
#[derive(Debug, Clone, Default)]
pub struct Systemctl;

impl Systemctl {
    /// Create a new systemctl driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run(operation: &str, unit: Option<&str>, tolerate_absent: bool) -> StrataResult<()> {
        let mut command = Command::new("systemctl");
        command.arg(operation);
        if let Some(unit) = unit {
            command.arg(unit);
        }

        tracing::debug!(operation, unit = ?unit, "Running systemctl");

        let output = command.output().map_err(|source| StrataError::Command {
            program: "systemctl".to_string(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if tolerate_absent && is_absent_unit(&stderr) {
            tracing::debug!(operation, unit = ?unit, "Unit not present, nothing to do");
            return Ok(());
        }

        Err(StrataError::Service {
            operation: operation.to_string(),
            unit: unit.unwrap_or_default().to_string(),
            message: stderr,
        })
    }
}

impl ServiceManager for Systemctl {
    fn reload(&self) -> StrataResult<()> {
        Self::run("daemon-reload", None, false)
    }

    fn enable(&self, unit: &str) -> StrataResult<()> {
        Self::run("enable", Some(unit), false)
    }

    fn disable(&self, unit: &str) -> StrataResult<()> {
        Self::run("disable", Some(unit), true)
    }

    fn start(&self, unit: &str) -> StrataResult<()> {
        Self::run("start", Some(unit), false)
    }

    fn stop(&self, unit: &str) -> StrataResult<()> {
        Self::run("stop", Some(unit), true)
    }
}

/// Whether systemctl complained because the unit does not exist.
fn is_absent_unit(stderr: &str) -> bool {
    stderr.contains("not loaded") || stderr.contains("does not exist")
}
