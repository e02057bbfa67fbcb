//! Volume lifecycle tests against in-memory LVM and systemd.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::Sandbox;
use strata::codec::NameCodec;
use strata::config::UnitNaming;
use strata::hooks::{HookBus, connect_volume_hooks};
use strata::lock::VolumeLock;
use strata::volume::{VolumeOperation, VolumeRequest, VolumeState};
use strata_common::{StrataError, VolumeSize};

fn size() -> VolumeSize {
    VolumeSize::mebibytes(4096)
}

#[test_log::test]
fn create_makes_path_a_volume() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");

    assert!(!manager.is_volume(&path).unwrap());
    manager.create(&path, size()).unwrap();

    assert!(manager.is_volume(&path).unwrap());
    let listed: Vec<PathBuf> = manager.list().unwrap();
    assert_eq!(listed.iter().filter(|p| **p == path).count(), 1);
}

#[test_log::test]
fn create_runs_steps_in_order() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    let name = manager.identifier(&path).unwrap();
    let unit = manager.units().unit_name(&path).unwrap();

    manager.create(&path, size()).unwrap();

    let device = format!("/dev/hostvg/{name}");
    assert_eq!(
        sandbox.calls(),
        vec![
            format!("lvcreate {name} 4Gi"),
            format!("lvchange {name} +imgbased:volume"),
            format!("mkfs {device}"),
            format!("rsync {} {device}", path.display()),
            "daemon-reload".to_string(),
            format!("enable {unit}"),
            format!("start {unit}"),
        ]
    );
}

#[test_log::test]
fn opt_app_scenario() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");

    manager.create(&path, size()).unwrap();

    let name = NameCodec::lvm().encode(&path).unwrap();
    assert!(name.ends_with("-opt-app"));
    assert!(manager.backend().contains(&name));

    let unit_path = manager.units().unit_path(&path).unwrap();
    assert_eq!(unit_path.parent(), Some(sandbox.unit_dir().as_path()));
    assert!(unit_path.to_string_lossy().ends_with("-opt-app.mount"));

    let content = fs::read_to_string(&unit_path).unwrap();
    assert!(content.contains(&format!("What=/dev/hostvg/{name}")));
    assert!(content.contains(&format!("Where={}", path.display())));
    assert!(content.contains("WantedBy=local-fs.target"));

    manager.remove(&path).unwrap();
    assert!(!manager.is_volume(&path).unwrap());
    assert!(!unit_path.exists());
    assert!(!manager.backend().contains(&name));
}

#[test_log::test]
fn dashed_directory_round_trips() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("var/lib/my-app");

    manager.create(&path, size()).unwrap();

    let name = manager.identifier(&path).unwrap();
    assert!(name.ends_with("-var-lib-my--app"));
    assert!(
        manager
            .units()
            .unit_name(&path)
            .unwrap()
            .ends_with("-var-lib-my\\x2dapp.mount")
    );
    assert_eq!(manager.list().unwrap(), vec![path]);
}

#[test_log::test]
fn legacy_unit_naming() {
    let sandbox = Sandbox::new();
    let config = sandbox.config().with_unit_naming(UnitNaming::Legacy);
    let manager = sandbox.manager_with(&config);
    let path = sandbox.dir("var/lib/my-app");

    manager.create(&path, size()).unwrap();

    let unit = manager.units().unit_name(&path).unwrap();
    assert_eq!(unit, format!("{}.mount", manager.identifier(&path).unwrap()));
    assert!(sandbox.unit_dir().join(&unit).exists());
}

#[test_log::test]
fn create_twice_fails_without_side_effects() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");

    manager.create(&path, size()).unwrap();
    sandbox.clear_calls();

    let err = manager.create(&path, size()).unwrap_err();
    assert!(matches!(err, StrataError::AlreadyVolume { .. }));
    assert!(sandbox.calls().is_empty());
}

#[test_log::test]
fn create_rejects_relative_path() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();

    let err = manager.create(Path::new("opt/app"), size()).unwrap_err();
    assert!(matches!(err, StrataError::RelativePath { .. }));
    assert!(err.is_precondition());
    assert!(sandbox.calls().is_empty());
}

#[test_log::test]
fn create_rejects_missing_directory() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.root().join("missing");

    let err = manager.create(&path, size()).unwrap_err();
    assert!(matches!(err, StrataError::NotADirectory { .. }));
    assert!(sandbox.calls().is_empty());
}

#[test_log::test]
fn create_rejects_regular_file() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.root().join("file");
    fs::write(&path, "data").unwrap();

    let err = manager.create(&path, size()).unwrap_err();
    assert!(matches!(err, StrataError::NotADirectory { .. }));
    assert!(sandbox.calls().is_empty());
}

#[test_log::test]
fn create_rejects_unencodable_path() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("with space");

    let err = manager.create(&path, size()).unwrap_err();
    assert!(matches!(err, StrataError::InvalidPath { .. }));
    assert!(sandbox.calls().is_empty());
}

#[test_log::test]
fn failed_format_deletes_new_volume() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    let name = manager.identifier(&path).unwrap();
    manager.provisioner().fail_format.set(true);

    let err = manager.create(&path, size()).unwrap_err();
    assert!(matches!(err, StrataError::Provision { .. }));

    assert!(!manager.backend().contains(&name));
    assert!(!manager.is_volume(&path).unwrap());
    assert_eq!(sandbox.calls().last(), Some(&format!("lvremove {name}")));
    assert!(!manager.units().unit_path(&path).unwrap().exists());
}

#[test_log::test]
fn failed_cleanup_keeps_provision_error() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    let name = manager.identifier(&path).unwrap();
    manager.provisioner().fail_format.set(true);
    manager.backend().fail_remove.set(true);

    let err = manager.create(&path, size()).unwrap_err();
    assert!(matches!(err, StrataError::Provision { .. }));

    // The orphan stays tagged and visible so it can be removed by hand
    assert!(manager.backend().contains(&name));
    assert_eq!(manager.list().unwrap(), vec![path.clone()]);
    assert!(!manager.units().unit_path(&path).unwrap().exists());
}

#[test_log::test]
fn failed_populate_deletes_new_volume() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    manager.provisioner().fail_populate.set(true);

    assert!(manager.create(&path, size()).is_err());
    assert!(manager.backend().names().is_empty());

    // The path can be created again once the copy works
    manager.provisioner().fail_populate.set(false);
    manager.create(&path, size()).unwrap();
    assert!(manager.is_volume(&path).unwrap());
}

#[test_log::test]
fn failed_start_keeps_volume() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    manager.services().fail_start.set(true);

    let err = manager.create(&path, size()).unwrap_err();
    assert!(matches!(err, StrataError::Service { .. }));

    // The data was copied, so the volume stays and can be attached later
    assert!(manager.is_volume(&path).unwrap());
    manager.services().fail_start.set(false);
    manager.attach(&path).unwrap();
    assert!(manager.status(&path).unwrap().is_consistent());
}

#[test_log::test]
fn detach_and_attach() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    let unit_path = manager.units().unit_path(&path).unwrap();

    manager.create(&path, size()).unwrap();
    assert!(unit_path.exists());

    manager.detach(&path).unwrap();
    assert!(!unit_path.exists());
    assert!(manager.is_volume(&path).unwrap());

    // Detaching twice is fine
    manager.detach(&path).unwrap();
    assert!(!unit_path.exists());

    manager.attach(&path).unwrap();
    assert!(unit_path.exists());
}

#[test_log::test]
fn operations_on_non_volume_fail_without_side_effects() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");

    for result in [
        manager.attach(&path),
        manager.detach(&path),
        manager.remove(&path),
    ] {
        assert!(matches!(result, Err(StrataError::NotVolume { .. })));
    }
    assert!(sandbox.calls().is_empty());
    assert!(fs::read_dir(sandbox.unit_dir()).unwrap().next().is_none());
}

#[test_log::test]
fn list_skips_foreign_and_untagged_volumes() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    manager.create(&path, size()).unwrap();

    manager.backend().insert("-var", &["imgbased:volume"]);
    manager.backend().insert("var-log", &[]);
    manager.backend().insert("home", &["imgbased:base"]);

    assert_eq!(manager.list().unwrap(), vec![path]);
    assert!(!manager.is_volume(Path::new("/var/log")).unwrap());
    assert!(!manager.is_volume(Path::new("/home")).unwrap());
}

#[test_log::test]
fn is_volume_ignores_trailing_separator() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    manager.create(&path, size()).unwrap();

    let with_slash = PathBuf::from(format!("{}/", path.display()));
    assert!(manager.is_volume(&with_slash).unwrap());
    assert!(!manager.is_volume(Path::new("opt/app")).unwrap());
}

#[test_log::test]
fn status_follows_lifecycle() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");

    let status = manager.status(&path).unwrap();
    assert_eq!(status.state(), VolumeState::Absent);
    assert!(status.is_consistent());

    manager.create(&path, size()).unwrap();
    let status = manager.status(&path).unwrap();
    assert_eq!(status.state(), VolumeState::Attached);
    assert!(status.mounted);
    assert!(status.unit_matches());
    assert!(status.is_consistent());

    manager.detach(&path).unwrap();
    let status = manager.status(&path).unwrap();
    assert_eq!(status.state(), VolumeState::Detached);
    assert!(!status.mounted);
    assert!(status.is_consistent());

    manager.remove(&path).unwrap();
    assert_eq!(manager.status(&path).unwrap().state(), VolumeState::Absent);
}

#[test_log::test]
fn check_reports_stale_mount() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let app = sandbox.dir("opt/app");
    let data = sandbox.dir("srv/data");
    manager.create(&app, size()).unwrap();
    manager.create(&data, size()).unwrap();

    // Unit file vanished while the volume stayed mounted
    fs::remove_file(manager.units().unit_path(&data).unwrap()).unwrap();

    let statuses = manager.check().unwrap();
    assert_eq!(statuses.len(), 2);
    let broken: Vec<&Path> = statuses
        .iter()
        .filter(|status| !status.is_consistent())
        .map(|status| status.path.as_path())
        .collect();
    assert_eq!(broken, vec![data.as_path()]);
}

#[test_log::test]
fn check_reads_inventory_once() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    for dir in ["opt/app", "srv/data", "var/cache"] {
        manager.create(&sandbox.dir(dir), size()).unwrap();
    }

    let before = manager.backend().inventory_queries();
    let statuses = manager.check().unwrap();
    assert_eq!(statuses.len(), 3);
    assert_eq!(manager.backend().inventory_queries(), before + 1);
}

#[test_log::test]
fn dispatch_records_event() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");

    let event = manager
        .dispatch(&VolumeRequest::Create {
            path: path.clone(),
            size: size(),
        })
        .unwrap();
    assert_eq!(event.operation, VolumeOperation::Create);
    assert_eq!(event.paths, vec![path.clone()]);

    let event = manager.dispatch(&VolumeRequest::List).unwrap();
    assert_eq!(event.paths, vec![path]);
}

#[test_log::test]
fn dispatch_fails_while_locked() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");

    let lock = VolumeLock::acquire(&sandbox.lock_file()).unwrap();
    let err = manager
        .dispatch(&VolumeRequest::Create {
            path: path.clone(),
            size: size(),
        })
        .unwrap_err();
    assert!(matches!(err, StrataError::Locked { .. }));
    assert!(sandbox.calls().is_empty());

    drop(lock);
    manager
        .dispatch(&VolumeRequest::Create { path, size: size() })
        .unwrap();
}

#[test_log::test]
fn hooks_drive_lifecycle() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let path = sandbox.dir("opt/app");
    let arg = path.display().to_string();

    let mut bus = HookBus::new();
    connect_volume_hooks(&mut bus, &manager);

    let events = bus
        .emit("volume-create", &[arg.clone(), "512M".to_string()])
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, VolumeOperation::Create);

    let events = bus.emit("volume-list", &[]).unwrap();
    assert_eq!(events[0].paths, vec![path.clone()]);

    bus.emit("volume-detach", &[arg.clone()]).unwrap();
    bus.emit("volume-remove", &[arg.clone()]).unwrap();
    drop(bus);

    assert!(!manager.is_volume(&path).unwrap());
    assert!(manager.backend().names().is_empty());
}

#[test_log::test]
fn hooks_reject_bad_events() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let mut bus = HookBus::new();
    connect_volume_hooks(&mut bus, &manager);

    assert!(matches!(
        bus.emit("volume-resize", &[]),
        Err(StrataError::UnknownEvent { .. })
    ));
    assert!(matches!(
        bus.emit("volume-attach", &[]),
        Err(StrataError::InvalidEventParams { .. })
    ));
    assert!(sandbox.calls().is_empty());
}
