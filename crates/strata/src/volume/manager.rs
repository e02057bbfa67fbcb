//! Volume lifecycle orchestration.

use std::fs;
use std::path::{Path, PathBuf};

use strata_common::{StrataError, StrataResult, VolumeSize};

use super::request::{VolumeEvent, VolumeRequest};
use super::status::VolumeStatus;
use crate::codec::{self, NameCodec};
use crate::config::StrataConfig;
use crate::filesystem::{HostProvisioner, Provisioner, mountinfo};
use crate::lock::VolumeLock;
use crate::storage::{LvmBackend, StorageBackend, VolumeRef};
use crate::systemd::{MountUnitGenerator, ServiceManager, Systemctl};

/// Creates, attaches, detaches and removes volumes.
///
/// The manager keeps the backend inventory, the mount unit files and the
/// live mounts in step by running every operation in a fixed order. It takes
/// no locks itself and assumes a single writer; [`VolumeManager::dispatch`]
/// holds the host-wide [`VolumeLock`] for one request.
///
/// A path is a volume iff the backend has a volume carrying the volume tag
/// whose name decodes to that path.
pub struct VolumeManager<B, S, P> {
    backend: B,
    services: S,
    provisioner: P,
    units: MountUnitGenerator,
    codec: NameCodec,
    tag: String,
    lock_file: PathBuf,
    mountinfo: PathBuf,
}

/// The manager wired to LVM, systemd and the host tools.
pub type HostVolumeManager = VolumeManager<LvmBackend, Systemctl, HostProvisioner>;

impl HostVolumeManager {
    /// Build a manager for the host from a configuration.
    #[must_use]
    pub fn from_config(config: &StrataConfig) -> Self {
        Self::new(
            LvmBackend::new(&config.volume_group, &config.thin_pool),
            Systemctl::new(),
            HostProvisioner::new(&config.filesystem),
            config,
        )
    }
}

impl<B, S, P> VolumeManager<B, S, P>
where
    B: StorageBackend,
    S: ServiceManager,
    P: Provisioner,
{
    /// Create a manager from its collaborators.
    pub fn new(backend: B, services: S, provisioner: P, config: &StrataConfig) -> Self {
        Self {
            backend,
            services,
            provisioner,
            units: config.unit_generator(),
            codec: NameCodec::lvm(),
            tag: config.volume_tag.clone(),
            lock_file: config.lock_file.clone(),
            mountinfo: config.mountinfo.clone(),
        }
    }

    /// The storage backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The service manager.
    pub const fn services(&self) -> &S {
        &self.services
    }

    /// The filesystem provisioner.
    pub const fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// The mount unit generator.
    pub const fn units(&self) -> &MountUnitGenerator {
        &self.units
    }

    /// Backing volume name for `path`.
    pub fn identifier(&self, path: &Path) -> StrataResult<String> {
        self.codec.encode(path)
    }

    /// All managed paths, sorted. Every call asks the backend again.
    pub fn list(&self) -> StrataResult<Vec<PathBuf>> {
        Ok(self.decode_paths(&self.tagged_volumes()?))
    }

    /// Whether `path` is a volume. Trailing separators are ignored.
    pub fn is_volume(&self, path: &Path) -> StrataResult<bool> {
        let Ok(path) = codec::normalize(path) else {
            return Ok(false);
        };
        Ok(self.list()?.contains(&path))
    }

    /// Turn the directory at `path` into a volume of `size` and attach it.
    ///
    /// The current contents of the directory are copied onto the new volume.
    /// If tagging, formatting or populating fails, the new backing volume is
    /// deleted again before the error is returned.
    pub fn create(&self, path: &Path, size: VolumeSize) -> StrataResult<()> {
        let path = codec::normalize(path)?;
        let identifier = self.codec.encode(&path)?;
        self.units.unit_name(&path)?;

        if !path.is_dir() {
            return Err(StrataError::NotADirectory { path });
        }
        if self.is_volume(&path)? {
            return Err(StrataError::AlreadyVolume { path });
        }

        tracing::debug!(path = %path.display(), %identifier, %size, "Creating volume");

        let volume = self.backend.create_volume(&identifier, size)?;
        if let Err(e) = self.provision(&path, &volume) {
            self.rollback(&volume);
            return Err(e);
        }

        tracing::info!(path = %path.display(), "Volume was created successfully");
        self.attach(&path)
    }

    /// Mount the volume for `path` through a generated mount unit.
    pub fn attach(&self, path: &Path) -> StrataResult<()> {
        let path = self.require_volume(path)?;
        let identifier = self.codec.encode(&path)?;
        let device = self.backend.lookup(&identifier)?.path;

        self.units.write(&path, &device)?;
        let unit = self.units.unit_name(&path)?;

        self.services.reload()?;
        self.services.enable(&unit)?;
        self.services.start(&unit)?;

        // Access it to trigger the mount.
        fs::read_dir(&path)?;

        tracing::info!(path = %path.display(), %unit, "Volume was attached successfully");
        Ok(())
    }

    /// Unmount the volume for `path` and remove its mount unit.
    ///
    /// Detaching a detached volume succeeds.
    pub fn detach(&self, path: &Path) -> StrataResult<()> {
        let path = self.require_volume(path)?;
        let unit = self.units.unit_name(&path)?;

        self.services.disable(&unit)?;
        self.services.stop(&unit)?;
        self.units.remove(&path)?;
        self.services.reload()?;

        tracing::info!(path = %path.display(), %unit, "Volume was detached successfully");
        Ok(())
    }

    /// Detach the volume for `path` and delete it with all its data.
    pub fn remove(&self, path: &Path) -> StrataResult<()> {
        let path = self.require_volume(path)?;
        let identifier = self.codec.encode(&path)?;

        tracing::warn!(
            path = %path.display(),
            "Removing the volume will also remove the data on that volume"
        );

        self.detach(&path)?;
        self.backend.remove_volume(&identifier)?;

        tracing::info!(path = %path.display(), "Volume was removed successfully");
        Ok(())
    }

    /// Compare backend, unit file and mount table for `path`.
    pub fn status(&self, path: &Path) -> StrataResult<VolumeStatus> {
        let path = codec::normalize(path)?;
        let volumes = self.tagged_volumes()?;
        self.status_of(path, &volumes)
    }

    /// Status of every managed volume.
    pub fn check(&self) -> StrataResult<Vec<VolumeStatus>> {
        let volumes = self.tagged_volumes()?;
        let mut statuses = Vec::new();
        for path in self.decode_paths(&volumes) {
            let status = self.status_of(path, &volumes)?;
            for problem in status.problems() {
                tracing::warn!(path = %status.path.display(), %problem, "Inconsistent volume");
            }
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Run one request while holding the volume lock.
    pub fn dispatch(&self, request: &VolumeRequest) -> StrataResult<VolumeEvent> {
        let _lock = VolumeLock::acquire(&self.lock_file)?;
        tracing::debug!(?request, "Dispatching volume request");

        let paths = match request {
            VolumeRequest::List => self.list()?,
            VolumeRequest::Create { path, size } => {
                self.create(path, *size)?;
                vec![path.clone()]
            }
            VolumeRequest::Remove { path } => {
                self.remove(path)?;
                vec![path.clone()]
            }
            VolumeRequest::Attach { path } => {
                self.attach(path)?;
                vec![path.clone()]
            }
            VolumeRequest::Detach { path } => {
                self.detach(path)?;
                vec![path.clone()]
            }
        };

        Ok(VolumeEvent::new(request.operation(), paths))
    }

    fn tagged_volumes(&self) -> StrataResult<Vec<VolumeRef>> {
        Ok(self
            .backend
            .find_by_tag(&self.tag)?
            .into_iter()
            .filter(|volume| volume.has_tag(&self.tag))
            .collect())
    }

    fn decode_paths(&self, volumes: &[VolumeRef]) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = volumes
            .iter()
            .filter_map(|volume| match self.codec.decode(&volume.name) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(
                        name = %volume.name,
                        error = %e,
                        "Skipping tagged volume with a foreign name"
                    );
                    None
                }
            })
            .collect();

        paths.sort();
        paths.dedup();
        paths
    }

    fn status_of(&self, path: PathBuf, volumes: &[VolumeRef]) -> StrataResult<VolumeStatus> {
        let identifier = self.codec.encode(&path)?;
        let unit_name = self.units.unit_name(&path)?;
        let device = volumes
            .iter()
            .find(|volume| volume.name == identifier)
            .map(|volume| volume.path.clone());

        Ok(VolumeStatus {
            tagged: device.is_some(),
            device,
            unit: self.units.read(&path)?,
            mounted: mountinfo::is_mounted(&self.mountinfo, &path)?,
            identifier,
            unit_name,
            path,
        })
    }

    fn require_volume(&self, path: &Path) -> StrataResult<PathBuf> {
        let path = codec::normalize(path)?;
        if !self.is_volume(&path)? {
            return Err(StrataError::NotVolume { path });
        }
        Ok(path)
    }

    fn provision(&self, path: &Path, volume: &VolumeRef) -> StrataResult<()> {
        self.backend.add_tag(volume, &self.tag)?;
        self.provisioner.format(&volume.path)?;
        self.provisioner.populate(path, &volume.path)
    }

    fn rollback(&self, volume: &VolumeRef) {
        tracing::warn!(name = %volume.name, "Provisioning failed, deleting the new volume");
        if let Err(e) = self.backend.remove_volume(&volume.name) {
            tracing::error!(
                name = %volume.name,
                error = %e,
                "Failed to delete volume, it has to be removed manually"
            );
        }
    }
}
