//! LVM thin pool backend.

use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;
use strata_common::{StrataError, StrataResult, VolumeSize};

use super::{StorageBackend, VolumeRef};

/// Report columns requested from `lvs`.
const LVS_COLUMNS: &str = "lv_name,vg_name,lv_path,lv_size,lv_tags";

/// Thin volumes in an LVM thin pool, driven through the LVM command line tools.
#[derive(Debug, Clone)]
pub struct LvmBackend {
    volume_group: String,
    thin_pool: String,
}

impl LvmBackend {
    /// Create a backend allocating from `volume_group/thin_pool`.
    pub fn new(volume_group: impl Into<String>, thin_pool: impl Into<String>) -> Self {
        Self {
            volume_group: volume_group.into(),
            thin_pool: thin_pool.into(),
        }
    }

    /// Volume group volumes are created in.
    #[must_use]
    pub fn volume_group(&self) -> &str {
        &self.volume_group
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}/{}", self.volume_group, name)
    }

    fn create_args(&self, name: &str, size: VolumeSize) -> Vec<String> {
        vec![
            "--thin".to_string(),
            "--virtualsize".to_string(),
            size.to_lvm_arg(),
            "--name".to_string(),
            name.to_string(),
            self.qualified(&self.thin_pool),
        ]
    }

    fn lvs(&self, selector: &str) -> StrataResult<Vec<VolumeRef>> {
        let output = run(
            "lvs",
            "list volumes",
            &[
                "--reportformat",
                "json",
                "--units",
                "b",
                "--nosuffix",
                "-o",
                LVS_COLUMNS,
                selector,
            ],
        )?;
        parse_report(&output)
    }
}

impl StorageBackend for LvmBackend {
    fn create_volume(&self, name: &str, size: VolumeSize) -> StrataResult<VolumeRef> {
        tracing::debug!(
            name,
            %size,
            pool = %self.qualified(&self.thin_pool),
            "Creating thin volume"
        );

        let args = self.create_args(name, size);
        run("lvcreate", "create volume", args.as_slice())?;
        self.lookup(name)
    }

    fn add_tag(&self, volume: &VolumeRef, tag: &str) -> StrataResult<()> {
        tracing::debug!(name = %volume.name, tag, "Tagging volume");

        let target = format!("{}/{}", volume.group, volume.name);
        run("lvchange", "tag volume", &["--addtag", tag, target.as_str()])?;
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> StrataResult<()> {
        tracing::debug!(name, group = %self.volume_group, "Removing volume");

        run("lvremove", "remove volume", &["-ff", self.qualified(name).as_str()])?;
        Ok(())
    }

    fn find_by_tag(&self, tag: &str) -> StrataResult<Vec<VolumeRef>> {
        let volumes = self.lvs(&format!("@{tag}"))?;
        Ok(volumes
            .into_iter()
            .filter(|v| {
                let ours = v.group == self.volume_group;
                if !ours {
                    tracing::debug!(
                        name = %v.name,
                        group = %v.group,
                        "Ignoring tagged volume in foreign volume group"
                    );
                }
                ours
            })
            .collect())
    }

    fn lookup(&self, name: &str) -> StrataResult<VolumeRef> {
        self.lvs(&self.qualified(name))?
            .into_iter()
            .next()
            .ok_or_else(|| StrataError::Backend {
                operation: "look up volume".to_string(),
                message: format!("{} not found", self.qualified(name)),
            })
    }
}

/// Run an LVM tool and return its stdout.
fn run<S: AsRef<std::ffi::OsStr>>(
    program: &str,
    operation: &str,
    args: &[S],
) -> StrataResult<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| StrataError::Command {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(StrataError::Backend {
            operation: operation.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Deserialize)]
struct LvsReport {
    report: Vec<LvsSection>,
}

#[derive(Debug, Deserialize)]
struct LvsSection {
    #[serde(default)]
    lv: Vec<LvsRow>,
}

#[derive(Debug, Deserialize)]
struct LvsRow {
    lv_name: String,
    vg_name: String,
    #[serde(default)]
    lv_path: String,
    #[serde(default)]
    lv_size: String,
    #[serde(default)]
    lv_tags: String,
}

impl From<LvsRow> for VolumeRef {
    fn from(row: LvsRow) -> Self {
        let path = if row.lv_path.is_empty() {
            PathBuf::from("/dev").join(&row.vg_name).join(&row.lv_name)
        } else {
            PathBuf::from(row.lv_path)
        };

        Self {
            size: row.lv_size.trim().parse().ok().map(VolumeSize::bytes),
            tags: row
                .lv_tags
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            name: row.lv_name,
            group: row.vg_name,
            path,
        }
    }
}

/// Parse the JSON report printed by `lvs --reportformat json`.
fn parse_report(json: &str) -> StrataResult<Vec<VolumeRef>> {
    let report: LvsReport = serde_json::from_str(json)?;
    Ok(report
        .report
        .into_iter()
        .flat_map(|section| section.lv)
        .map(VolumeRef::from)
        .collect())
}
