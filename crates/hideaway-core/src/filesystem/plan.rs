//! Bind-mount topology for privileged containers.
//!
//! A [`MountPlan`] lists every bind in the order it must happen: system
//! directories, then system files (both only for root filesystems), then
//! the descriptor's own mounts. A user mount may therefore shadow a system
//! path. Applying a plan stops at the first failure and leaves whatever was
//! already mounted in place; the [`MountJournal`] says what that was.

use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use hideaway_common::config::ShimConfig;
use hideaway_common::error::{HideawayError, Result};
use hideaway_common::types::ContainerDescriptor;

use super::confine;
use super::mount::Mounter;

/// What has to exist at a mount target before binding onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A directory tree, created recursively.
    Directory,
    /// An empty regular file; a file can only be mounted over a file.
    File,
}

/// One bind mount in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountStep {
    /// Host source path.
    pub src: PathBuf,
    /// Absolute target under the working directory.
    pub dst: PathBuf,
    /// Shape of the target to materialize.
    pub kind: TargetKind,
    /// Whether the bind is read-only.
    pub read_only: bool,
}

impl fmt::Display for MountStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.read_only { "ro" } else { "rw" };
        let kind = match self.kind {
            TargetKind::Directory => "dir",
            TargetKind::File => "file",
        };
        write!(
            f,
            "bind {} -> {} ({mode}, {kind})",
            self.src.display(),
            self.dst.display()
        )
    }
}

/// Ordered bind mounts for one privileged container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPlan {
    steps: Vec<MountStep>,
}

impl MountPlan {
    /// Computes the plan for `descriptor`.
    ///
    /// Pure: nothing on disk is touched.
    ///
    /// # Errors
    ///
    /// Returns [`HideawayError::PathEscape`] if a destination leaves the
    /// working directory and confinement is enabled.
    pub fn privileged(descriptor: &ContainerDescriptor, config: &ShimConfig) -> Result<Self> {
        let work_dir = descriptor.work_dir();
        let confined = config.confine_destinations;
        let mut steps = Vec::new();

        if descriptor.has_rootfs {
            for dir in &config.system_dirs {
                steps.push(MountStep {
                    src: dir.clone(),
                    dst: confine::join(work_dir, dir, confined)?,
                    kind: TargetKind::Directory,
                    read_only: true,
                });
            }
            for file in &config.system_files {
                steps.push(MountStep {
                    src: file.clone(),
                    dst: confine::join(work_dir, file, confined)?,
                    kind: TargetKind::File,
                    read_only: true,
                });
            }
        }

        for bm in &descriptor.bind_mounts {
            steps.push(MountStep {
                src: bm.src_path.clone(),
                dst: confine::join(work_dir, &bm.dst_path, confined)?,
                kind: TargetKind::Directory,
                read_only: bm.mode.is_read_only(),
            });
        }

        Ok(Self { steps })
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[MountStep] {
        &self.steps
    }

    /// Materializes each target and binds onto it, in order.
    ///
    /// Every successful bind is pushed onto `journal` before the next step
    /// starts. Runs once: a failed step is never retried.
    ///
    /// # Errors
    ///
    /// Returns the first [`HideawayError::Filesystem`] or
    /// [`HideawayError::Mount`] encountered.
    pub fn apply<M: Mounter + ?Sized>(
        &self,
        mounter: &M,
        config: &ShimConfig,
        journal: &mut MountJournal,
    ) -> Result<()> {
        for step in &self.steps {
            materialize(step, config)?;
            mounter.bind_mount(&step.src, &step.dst, step.read_only)?;
            journal.record(step.dst.clone());
        }
        Ok(())
    }
}

impl fmt::Display for MountPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{step}")?;
        }
        Ok(())
    }
}

fn materialize(step: &MountStep, config: &ShimConfig) -> Result<()> {
    match step.kind {
        TargetKind::Directory => {
            super::create_dir_all(&step.dst, config.dir_mode, "create target for bind mount")
        }
        TargetKind::File => {
            if let Some(parent) = step.dst.parent() {
                super::create_dir_all(parent, config.dir_mode, "create target for bind mount")?;
            }
            create_empty_file(&step.dst, config.file_mode)
        }
    }
}

/// Creates `path` if missing; existing content is left alone.
fn create_empty_file(path: &Path, mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    let _ = options.create(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let _ = options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    let _file = options.open(path).map_err(|e| HideawayError::Filesystem {
        action: "create target for bind mount",
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Targets mounted so far, in mount order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountJournal {
    mounted: Vec<PathBuf>,
}

impl MountJournal {
    /// Creates an empty journal.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mounted: Vec::new(),
        }
    }

    fn record(&mut self, target: PathBuf) {
        self.mounted.push(target);
    }

    /// Returns the mounted targets in mount order.
    #[must_use]
    pub fn mounted(&self) -> &[PathBuf] {
        &self.mounted
    }

    /// Returns `true` if nothing was mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }

    /// Unmounts every recorded target, newest first.
    ///
    /// Best effort: a failed unmount is logged and skipped. The journal is
    /// empty afterwards. Returns the number of targets that failed.
    pub fn rollback<M: Mounter + ?Sized>(&mut self, mounter: &M) -> usize {
        let mut failed = 0;
        while let Some(target) = self.mounted.pop() {
            if let Err(e) = mounter.unmount(&target) {
                tracing::warn!(target = %target.display(), error = %e, "rollback unmount failed");
                failed += 1;
            }
        }
        failed
    }
}

/// Bind mounts system paths and the descriptor's mounts into the working directory.
///
/// # Errors
///
/// Returns the first planning, filesystem, or mount failure. Mounts made
/// before the failure stay in place and are listed in `journal`.
pub fn setup_privileged<M: Mounter + ?Sized>(
    descriptor: &ContainerDescriptor,
    mounter: &M,
    config: &ShimConfig,
    journal: &mut MountJournal,
) -> Result<()> {
    let plan = MountPlan::privileged(descriptor, config)?;
    tracing::debug!(id = %descriptor.id, steps = plan.steps().len(), "applying mount plan");
    plan.apply(mounter, config, journal)?;
    tracing::info!(id = %descriptor.id, mounted = journal.mounted().len(), "privileged setup complete");
    Ok(())
}
