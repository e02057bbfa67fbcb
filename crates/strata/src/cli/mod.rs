//! CLI command definitions and handlers.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use strata_common::VolumeSize;
use strata_common::paths::STRATA_CONFIG;
use tabled::{Table, Tabled};

use crate::config::StrataConfig;
use crate::hooks::{HookBus, connect_volume_hooks};
use crate::volume::{HostVolumeManager, VolumeRequest, VolumeStatus};

/// Strata - Persistent volume manager
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Volume group holding the thin pool
    #[arg(long, global = true)]
    pub volume_group: Option<String>,

    /// Thin pool new volumes are allocated from
    #[arg(long, global = true)]
    pub thin_pool: Option<String>,

    /// Directory mount units are written to
    #[arg(long, global = true, env = "STRATA_UNIT_DIR")]
    pub unit_dir: Option<PathBuf>,

    /// Lock file serializing volume operations
    #[arg(long, global = true)]
    pub lock_file: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage persistent volumes
    Volume {
        /// The volume operation.
        #[command(subcommand)]
        command: VolumeCommands,
    },

    /// Emit a hook event, e.g. `volume-create /var/log 4G`
    Hook {
        /// Event name
        event: String,

        /// Event parameters, in order
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Volume commands.
#[derive(Subcommand)]
pub enum VolumeCommands {
    /// List all volumes
    List {
        /// Show backing volume, unit and mount state
        #[arg(short, long)]
        long: bool,
    },

    /// Turn a directory into a volume and attach it
    Create {
        /// Directory to move onto the volume
        path: PathBuf,

        /// Volume size (plain numbers are MiB, e.g. 4096, 512M, 4G)
        size: VolumeSize,
    },

    /// Detach a volume and delete it with all its data
    Remove {
        /// Volume path
        path: PathBuf,
    },

    /// Mount a volume through its mount unit
    Attach {
        /// Volume path
        path: PathBuf,
    },

    /// Unmount a volume and remove its mount unit
    Detach {
        /// Volume path
        path: PathBuf,
    },

    /// Show backend, unit and mount state of a path
    Status {
        /// Path to inspect
        path: PathBuf,
    },

    /// Check every volume for inconsistencies
    Check,
}

#[derive(Tabled)]
struct VolumeRow {
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "UNIT")]
    unit: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "MOUNTED")]
    mounted: String,
    #[tabled(rename = "CONSISTENT")]
    consistent: String,
}

impl From<&VolumeStatus> for VolumeRow {
    fn from(status: &VolumeStatus) -> Self {
        let yes_no = |value: bool| if value { "yes" } else { "no" }.to_string();
        Self {
            path: status.path.display().to_string(),
            name: status.identifier.clone(),
            unit: status.unit_name.clone(),
            state: status.state().to_string(),
            mounted: yes_no(status.mounted),
            consistent: yes_no(status.is_consistent()),
        }
    }
}

impl Cli {
    /// Resolve the configuration from the file and the command line.
    pub fn load_config(&self) -> Result<StrataConfig> {
        let mut config = match &self.config {
            Some(path) => StrataConfig::load(path, true)?,
            None => StrataConfig::load(&STRATA_CONFIG, false)?,
        };

        if let Some(volume_group) = &self.volume_group {
            config = config.with_volume_group(volume_group);
        }
        if let Some(thin_pool) = &self.thin_pool {
            config = config.with_thin_pool(thin_pool);
        }
        if let Some(unit_dir) = &self.unit_dir {
            config = config.with_unit_dir(unit_dir);
        }
        if let Some(lock_file) = &self.lock_file {
            config = config.with_lock_file(lock_file);
        }

        config.validate()?;
        Ok(config)
    }

    /// Execute the CLI command.
    pub fn execute(self) -> Result<()> {
        let config = self.load_config()?;
        let manager = HostVolumeManager::from_config(&config);

        match self.command {
            Commands::Volume { command } => execute_volume(&manager, command),

            Commands::Hook { event, args } => {
                let mut bus = HookBus::new();
                connect_volume_hooks(&mut bus, &manager);

                for record in bus.emit(&event, &args)? {
                    println!("{}", serde_json::to_string(&record)?);
                }
                Ok(())
            }
        }
    }
}

fn execute_volume(manager: &HostVolumeManager, command: VolumeCommands) -> Result<()> {
    match command {
        VolumeCommands::List { long: false } => {
            let event = manager.dispatch(&VolumeRequest::List)?;
            for path in event.paths {
                println!("{}", path.display());
            }
            Ok(())
        }

        VolumeCommands::List { long: true } => {
            let statuses = manager.check()?;
            print_statuses(&statuses);
            Ok(())
        }

        VolumeCommands::Create { path, size } => {
            manager.dispatch(&VolumeRequest::Create {
                path: path.clone(),
                size,
            })?;
            println!("Volume {} created ({size})", path.display());
            Ok(())
        }

        VolumeCommands::Remove { path } => {
            manager.dispatch(&VolumeRequest::Remove { path: path.clone() })?;
            println!("Volume {} removed", path.display());
            Ok(())
        }

        VolumeCommands::Attach { path } => {
            manager.dispatch(&VolumeRequest::Attach { path: path.clone() })?;
            println!("Volume {} attached", path.display());
            Ok(())
        }

        VolumeCommands::Detach { path } => {
            manager.dispatch(&VolumeRequest::Detach { path: path.clone() })?;
            println!("Volume {} detached", path.display());
            Ok(())
        }

        VolumeCommands::Status { path } => {
            let status = manager.status(&path)?;
            print_statuses(std::slice::from_ref(&status));
            for problem in status.problems() {
                println!("{}: {problem}", status.path.display());
            }
            Ok(())
        }

        VolumeCommands::Check => {
            let statuses = manager.check()?;
            print_statuses(&statuses);

            let inconsistent: Vec<&Path> = statuses
                .iter()
                .filter(|status| !status.is_consistent())
                .map(|status| status.path.as_path())
                .collect();
            if inconsistent.is_empty() {
                return Ok(());
            }
            for path in &inconsistent {
                println!("{} is inconsistent", path.display());
            }
            Err(eyre!("{} volume(s) are inconsistent", inconsistent.len()))
        }
    }
}

fn print_statuses(statuses: &[VolumeStatus]) {
    if statuses.is_empty() {
        println!("No volumes");
        return;
    }
    let rows: Vec<VolumeRow> = statuses.iter().map(VolumeRow::from).collect();
    println!("{}", Table::new(rows));
}
