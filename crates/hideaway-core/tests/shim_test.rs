//! End-to-end tests for container setup and launch through [`Shim`].
//!
//! Mount syscalls are replaced by a recording host so the privileged
//! strategy runs without root; directory creation, symlinks, and lookups
//! hit a real temporary tree.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use hideaway_common::error::{HideawayError, Result};
use hideaway_common::types::{BindMountSpec, ContainerDescriptor, ProcessSpec};
use hideaway_core::capability::HostCapabilities;
use hideaway_core::filesystem::{MountJournal, Mounter};
use hideaway_core::shim::SetupPlan;
use hideaway_core::{HostEnv, Shim, Strategy};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bind {
    src: PathBuf,
    dst: PathBuf,
    read_only: bool,
}

#[derive(Default)]
struct RecordingHost {
    privileged: bool,
    binds: RefCell<Vec<Bind>>,
    unmounts: RefCell<Vec<PathBuf>>,
    attempts: Cell<usize>,
    fail_at_attempt: Option<usize>,
}

impl RecordingHost {
    fn capable() -> Self {
        Self {
            privileged: true,
            ..Self::default()
        }
    }
}

impl HostCapabilities for RecordingHost {
    fn supports_privileged(&self) -> bool {
        self.privileged
    }
}

impl Mounter for RecordingHost {
    fn bind_mount(&self, src: &Path, dst: &Path, read_only: bool) -> Result<()> {
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);
        if self.fail_at_attempt == Some(attempt) {
            return Err(HideawayError::Mount {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        self.binds.borrow_mut().push(Bind {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            read_only,
        });
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        self.unmounts.borrow_mut().push(target.to_path_buf());
        Ok(())
    }
}

fn install(root: &Path, rel: &str, mode: u32) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "#!/bin/sh\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
}

// ── Privileged setup ─────────────────────────────────────────────────

#[test]
fn privileged_rootfs_mounts_system_dirs_read_only() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true);
    let shim = Shim::with_host(descriptor, RecordingHost::capable());

    assert_eq!(shim.setup().unwrap(), Strategy::Privileged);

    let binds = shim.host().binds.borrow();
    for dir in ["proc", "dev", "sys"] {
        let target = work.path().join(dir);
        assert!(target.is_dir(), "{dir} should exist under the working directory");
        let bind = binds.iter().find(|b| b.dst == target).expect("bind recorded");
        assert_eq!(bind.src, Path::new("/").join(dir));
        assert!(bind.read_only);
    }
    for file in ["etc/resolv.conf", "etc/hosts"] {
        let target = work.path().join(file);
        assert!(target.is_file());
        assert!(binds.iter().any(|b| b.dst == target && b.read_only));
    }
}

#[cfg(target_os = "linux")]
#[test]
fn created_mount_targets_use_directory_mode() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true);
    Shim::with_host(descriptor, RecordingHost::capable())
        .setup()
        .unwrap();
    let mode = fs::metadata(work.path().join("proc")).unwrap().permissions().mode();
    // umask may clear bits but never adds them
    assert_eq!(mode & 0o7777 & !0o755, 0);
}

#[test]
fn user_mounts_follow_system_mounts_and_may_shadow_them() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true)
        .bind_mount(BindMountSpec::read_write("/srv/fake-proc", "proc"))
        .bind_mount(BindMountSpec::read_only("/srv/config", "etc/app"));
    let shim = Shim::with_host(descriptor, RecordingHost::capable());
    let _ = shim.setup().unwrap();

    let binds = shim.host().binds.borrow();
    assert_eq!(binds.len(), 7);
    assert_eq!(binds[5].src, PathBuf::from("/srv/fake-proc"));
    assert_eq!(binds[5].dst, work.path().join("proc"));
    assert!(!binds[5].read_only);
    assert!(binds[6].read_only);
    assert!(work.path().join("etc/app").is_dir());
}

#[test]
fn rootless_privileged_container_only_mounts_user_specs() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .privileged(true)
        .bind_mount(BindMountSpec::read_write("/srv/data", "data"));
    let shim = Shim::with_host(descriptor, RecordingHost::capable());
    let _ = shim.setup().unwrap();

    assert_eq!(shim.host().binds.borrow().len(), 1);
    assert!(!work.path().join("proc").exists());
}

#[test]
fn failed_mount_aborts_and_is_not_retried() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true);
    let host = RecordingHost {
        fail_at_attempt: Some(2),
        ..RecordingHost::capable()
    };
    let shim = Shim::with_host(descriptor, host);
    let mut journal = MountJournal::new();

    let err = shim.setup_with_journal(&mut journal).unwrap_err();
    assert!(matches!(err, HideawayError::Mount { ref dst, .. } if dst.ends_with("dev")));
    assert_eq!(shim.host().attempts.get(), 2);
    assert_eq!(journal.mounted(), [work.path().join("proc")]);
    assert!(!work.path().join("sys").exists());

    assert_eq!(journal.rollback(shim.host()), 0);
    assert_eq!(*shim.host().unmounts.borrow(), [work.path().join("proc")]);
}

#[test]
fn privileged_request_on_incapable_host_touches_nothing() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true)
        .bind_mount(BindMountSpec::read_write("/srv/data", "data"));
    let shim = Shim::with_host(descriptor, RecordingHost::default());

    let err = shim.setup().unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(shim.host().attempts.get(), 0);
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);

    let err = shim.command(&ProcessSpec::new("sh")).unwrap_err();
    assert!(matches!(err, HideawayError::PrivilegedUnsupported { .. }));
}

// ── Unprivileged setup ───────────────────────────────────────────────

#[test]
fn unprivileged_mount_is_symlink_to_absolute_source() {
    let work = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    let dst = work.path().join("app/data");
    fs::create_dir_all(&dst).unwrap();
    fs::write(dst.join("stale"), "x").unwrap();

    let descriptor = ContainerDescriptor::new(work.path())
        .bind_mount(BindMountSpec::read_write(src.path(), "app/data"));
    let shim = Shim::with_host(descriptor, RecordingHost::capable());

    assert_eq!(shim.setup().unwrap(), Strategy::Unprivileged);
    assert!(fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&dst).unwrap(), src.path());
    assert_eq!(shim.host().attempts.get(), 0);
}

#[test]
fn unprivileged_read_only_mount_is_rejected() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .bind_mount(BindMountSpec::read_only("/srv/data", "data"));
    let shim = Shim::with_host(descriptor, RecordingHost::capable());

    let err = shim.setup().unwrap_err();
    assert!(matches!(err, HideawayError::ReadOnlyBindMountUnsupported { .. }));
    assert!(fs::symlink_metadata(work.path().join("data")).is_err());
}

// ── Launch ───────────────────────────────────────────────────────────

#[test]
fn privileged_invocation_is_relative_to_new_root() {
    let work = tempfile::tempdir().unwrap();
    install(work.path(), "usr/bin/myprog", 0o755);
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true)
        .env("LANG", "C");
    let shim = Shim::with_host(descriptor, RecordingHost::capable())
        .host_env(HostEnv::from_vars(vec![("PATH".into(), "/usr/bin".into())]));

    let inv = shim.command(&ProcessSpec::new("myprog")).unwrap();
    assert_eq!(inv.program, PathBuf::from("/usr/bin/myprog"));
    assert_eq!(inv.root.as_deref(), Some(work.path()));
    assert_eq!(inv.dir, PathBuf::from("/"));
    assert_eq!(inv.env_value("LANG"), Some("C"));

    assert_eq!(
        shim.resolve("myprog").unwrap(),
        work.path().join("usr/bin/myprog")
    );
}

#[test]
fn container_path_override_is_rebased() {
    let work = tempfile::tempdir().unwrap();
    install(work.path(), "opt/tools/lint", 0o755);
    install(work.path(), "usr/bin/lint", 0o755);
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true)
        .env("PATH", "/opt/tools:/usr/bin");
    let shim = Shim::with_host(descriptor, RecordingHost::capable());

    let inv = shim.command(&ProcessSpec::new("lint")).unwrap();
    assert_eq!(inv.program, PathBuf::from("/opt/tools/lint"));
}

#[test]
fn non_executable_in_rootfs_is_executable_not_found() {
    let work = tempfile::tempdir().unwrap();
    install(work.path(), "bin/notes", 0o644);
    let descriptor = ContainerDescriptor::new(work.path())
        .rootfs(true)
        .privileged(true);
    let shim = Shim::with_host(descriptor, RecordingHost::capable());

    let err = shim.command(&ProcessSpec::new("notes")).unwrap_err();
    match err {
        HideawayError::ExecutableNotFound { message, .. } => {
            assert!(message.contains("not executable"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unprivileged_invocation_runs_under_host_root() {
    let descriptor = ContainerDescriptor::new("/var/lib/hideaway/c1");
    let shim = Shim::with_host(descriptor, RecordingHost::capable())
        .host_env(HostEnv::from_vars(Vec::new()));
    let inv = shim
        .command(&ProcessSpec::new("./run.sh").dir("app").args(["--port", "8080"]))
        .unwrap();
    assert_eq!(inv.program, PathBuf::from("./run.sh"));
    assert_eq!(inv.dir, PathBuf::from("/var/lib/hideaway/c1/app"));
    assert!(inv.root.is_none());
    assert_eq!(inv.args, vec!["--port", "8080"]);
}

// ── Planning ─────────────────────────────────────────────────────────

#[test]
fn plan_matches_strategy() {
    let work = tempfile::tempdir().unwrap();
    let descriptor = ContainerDescriptor::new(work.path())
        .bind_mount(BindMountSpec::read_write("/srv/data", "data"));

    let shim = Shim::with_host(descriptor.clone(), RecordingHost::capable());
    assert!(matches!(shim.plan().unwrap(), SetupPlan::Links(_)));

    let shim = Shim::with_host(descriptor.privileged(true), RecordingHost::capable());
    let plan = shim.plan().unwrap();
    assert!(matches!(plan, SetupPlan::Mounts(_)));
    assert!(plan.to_string().starts_with("bind /srv/data -> "));
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
}
