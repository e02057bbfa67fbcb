//! Shared fakes and sandbox for the volume manager tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use strata::config::StrataConfig;
use strata::filesystem::Provisioner;
use strata::storage::{StorageBackend, VolumeRef};
use strata::systemd::{MountUnit, ServiceManager};
use strata::volume::VolumeManager;
use strata_common::{StrataError, StrataResult, VolumeSize};
use tempfile::TempDir;

/// Ordered record of every side effect, shared by all fakes.
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// The manager wired to the fakes.
pub type TestManager = VolumeManager<FakeBackend, FakeServices, FakeProvisioner>;

/// In-memory thin pool.
pub struct FakeBackend {
    volumes: RefCell<BTreeMap<String, VolumeRef>>,
    dev_dir: PathBuf,
    log: CallLog,
    pub fail_remove: Cell<bool>,
    inventory_queries: Cell<usize>,
}

impl FakeBackend {
    pub fn contains(&self, name: &str) -> bool {
        self.volumes.borrow().contains_key(name)
    }

    /// How often the tagged inventory was listed.
    pub fn inventory_queries(&self) -> usize {
        self.inventory_queries.get()
    }

    pub fn names(&self) -> Vec<String> {
        self.volumes.borrow().keys().cloned().collect()
    }

    /// Add a volume behind the manager's back.
    pub fn insert(&self, name: &str, tags: &[&str]) {
        let volume = VolumeRef {
            name: name.to_string(),
            group: "hostvg".to_string(),
            path: self.dev_dir.join(name),
            size: Some(VolumeSize::mebibytes(1)),
            tags: tags.iter().map(ToString::to_string).collect(),
        };
        self.volumes.borrow_mut().insert(name.to_string(), volume);
    }
}

impl StorageBackend for FakeBackend {
    fn create_volume(&self, name: &str, size: VolumeSize) -> StrataResult<VolumeRef> {
        self.log.borrow_mut().push(format!("lvcreate {name} {size}"));
        if self.contains(name) {
            return Err(StrataError::Backend {
                operation: "create volume".to_string(),
                message: format!("{name} already exists"),
            });
        }
        let volume = VolumeRef {
            name: name.to_string(),
            group: "hostvg".to_string(),
            path: self.dev_dir.join(name),
            size: Some(size),
            tags: Vec::new(),
        };
        self.volumes
            .borrow_mut()
            .insert(name.to_string(), volume.clone());
        Ok(volume)
    }

    fn add_tag(&self, volume: &VolumeRef, tag: &str) -> StrataResult<()> {
        self.log
            .borrow_mut()
            .push(format!("lvchange {} +{tag}", volume.name));
        match self.volumes.borrow_mut().get_mut(&volume.name) {
            Some(volume) => {
                volume.tags.push(tag.to_string());
                Ok(())
            }
            None => Err(StrataError::Backend {
                operation: "add tag".to_string(),
                message: format!("{} not found", volume.name),
            }),
        }
    }

    fn remove_volume(&self, name: &str) -> StrataResult<()> {
        self.log.borrow_mut().push(format!("lvremove {name}"));
        if self.fail_remove.get() {
            return Err(StrataError::Backend {
                operation: "remove volume".to_string(),
                message: format!("logical volume {name} in use"),
            });
        }
        self.volumes
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StrataError::Backend {
                operation: "remove volume".to_string(),
                message: format!("{name} not found"),
            })
    }

    fn find_by_tag(&self, tag: &str) -> StrataResult<Vec<VolumeRef>> {
        self.inventory_queries.set(self.inventory_queries.get() + 1);
        Ok(self
            .volumes
            .borrow()
            .values()
            .filter(|volume| volume.has_tag(tag))
            .cloned()
            .collect())
    }

    fn lookup(&self, name: &str) -> StrataResult<VolumeRef> {
        self.volumes
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| StrataError::Backend {
                operation: "lookup volume".to_string(),
                message: format!("{name} not found"),
            })
    }
}

/// Service manager that mounts by editing a fake mount table.
pub struct FakeServices {
    unit_dir: PathBuf,
    mountinfo: PathBuf,
    log: CallLog,
    pub fail_start: Cell<bool>,
}

impl FakeServices {
    fn unit(&self, unit: &str) -> Option<MountUnit> {
        fs::read_to_string(self.unit_dir.join(unit))
            .ok()
            .and_then(|content| MountUnit::parse(&content))
    }

    fn mount_lines(&self) -> Vec<String> {
        fs::read_to_string(&self.mountinfo)
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    fn write_mount_lines(&self, lines: &[String]) -> StrataResult<()> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&self.mountinfo, content)?;
        Ok(())
    }
}

impl ServiceManager for FakeServices {
    fn reload(&self) -> StrataResult<()> {
        self.log.borrow_mut().push("daemon-reload".to_string());
        Ok(())
    }

    fn enable(&self, unit: &str) -> StrataResult<()> {
        self.log.borrow_mut().push(format!("enable {unit}"));
        Ok(())
    }

    fn disable(&self, unit: &str) -> StrataResult<()> {
        self.log.borrow_mut().push(format!("disable {unit}"));
        Ok(())
    }

    fn start(&self, unit: &str) -> StrataResult<()> {
        self.log.borrow_mut().push(format!("start {unit}"));
        if self.fail_start.get() {
            return Err(StrataError::Service {
                operation: "start".to_string(),
                unit: unit.to_string(),
                message: "mount failed".to_string(),
            });
        }
        let mount = self.unit(unit).ok_or_else(|| StrataError::Service {
            operation: "start".to_string(),
            unit: unit.to_string(),
            message: "unit not loaded".to_string(),
        })?;

        let mut lines = self.mount_lines();
        lines.push(format!(
            "{} 1 253:{} / {} rw,relatime - ext4 {} rw,{}",
            lines.len() + 100,
            lines.len(),
            mount.target.display(),
            mount.device.display(),
            mount.options
        ));
        self.write_mount_lines(&lines)
    }

    fn stop(&self, unit: &str) -> StrataResult<()> {
        self.log.borrow_mut().push(format!("stop {unit}"));
        let Some(mount) = self.unit(unit) else {
            return Ok(());
        };
        let target = format!(" {} ", mount.target.display());
        let lines: Vec<String> = self
            .mount_lines()
            .into_iter()
            .filter(|line| !line.contains(&target))
            .collect();
        self.write_mount_lines(&lines)
    }
}

/// Provisioner with injectable failures.
pub struct FakeProvisioner {
    log: CallLog,
    pub fail_format: Cell<bool>,
    pub fail_populate: Cell<bool>,
}

impl Provisioner for FakeProvisioner {
    fn format(&self, device: &Path) -> StrataResult<()> {
        self.log
            .borrow_mut()
            .push(format!("mkfs {}", device.display()));
        if self.fail_format.get() {
            return Err(StrataError::Provision {
                device: device.to_path_buf(),
                message: "mkfs.ext4 exited with status 1".to_string(),
            });
        }
        Ok(())
    }

    fn populate(&self, source: &Path, device: &Path) -> StrataResult<()> {
        self.log
            .borrow_mut()
            .push(format!("rsync {} {}", source.display(), device.display()));
        if self.fail_populate.get() {
            return Err(StrataError::Provision {
                device: device.to_path_buf(),
                message: "rsync exited with status 23".to_string(),
            });
        }
        Ok(())
    }
}

/// Temporary host layout: directories to turn into volumes, a unit
/// directory, a mount table and a lock file.
pub struct Sandbox {
    root: TempDir,
    pub log: CallLog,
}

impl Sandbox {
    pub fn new() -> Self {
        // The default ".tmp" prefix is not a valid volume path component.
        let root = tempfile::Builder::new()
            .prefix("strata")
            .tempdir()
            .expect("create sandbox");
        fs::create_dir_all(root.path().join("units")).expect("create unit dir");
        fs::write(root.path().join("mountinfo"), "").expect("create mountinfo");
        Self {
            root,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Create a directory below the sandbox root.
    pub fn dir(&self, relative: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(&path).expect("create directory");
        path
    }

    pub fn unit_dir(&self) -> PathBuf {
        self.root().join("units")
    }

    pub fn mountinfo(&self) -> PathBuf {
        self.root().join("mountinfo")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root().join("run").join("volumes.lock")
    }

    pub fn config(&self) -> StrataConfig {
        StrataConfig::default()
            .with_unit_dir(self.unit_dir())
            .with_mountinfo(self.mountinfo())
            .with_lock_file(self.lock_file())
    }

    pub fn manager(&self) -> TestManager {
        self.manager_with(&self.config())
    }

    pub fn manager_with(&self, config: &StrataConfig) -> TestManager {
        let backend = FakeBackend {
            volumes: RefCell::new(BTreeMap::new()),
            dev_dir: PathBuf::from("/dev").join(&config.volume_group),
            log: Rc::clone(&self.log),
            fail_remove: Cell::new(false),
            inventory_queries: Cell::new(0),
        };
        let services = FakeServices {
            unit_dir: config.unit_dir.clone(),
            mountinfo: config.mountinfo.clone(),
            log: Rc::clone(&self.log),
            fail_start: Cell::new(false),
        };
        let provisioner = FakeProvisioner {
            log: Rc::clone(&self.log),
            fail_format: Cell::new(false),
            fail_populate: Cell::new(false),
        };
        VolumeManager::new(backend, services, provisioner, config)
    }

    /// Everything the fakes recorded so far.
    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }
}
