//! Symlink emulation of bind mounts for unprivileged containers.
//!
//! A link replaces whatever sits at the destination and points at the
//! absolute source. The process sees a symlink rather than a transparent
//! mount, and nothing stops it from following the link back out.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hideaway_common::config::ShimConfig;
use hideaway_common::error::{HideawayError, Result};
use hideaway_common::types::ContainerDescriptor;

use super::confine;

/// One emulated bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStep {
    /// Absolute host path the link points at.
    pub src: PathBuf,
    /// Link location under the working directory.
    pub dst: PathBuf,
}

impl fmt::Display for LinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link {} -> {}", self.dst.display(), self.src.display())
    }
}

/// Ordered links for one unprivileged container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    work_dir: PathBuf,
    steps: Vec<LinkStep>,
}

impl LinkPlan {
    /// Computes the links for `descriptor` without touching the destinations.
    ///
    /// Every mount is checked before anything is returned, so a read-only
    /// mount anywhere in the list rejects the whole plan.
    ///
    /// # Errors
    ///
    /// Returns [`HideawayError::ReadOnlyBindMountUnsupported`] for any
    /// read-only mount, [`HideawayError::PathEscape`] for an escaping
    /// destination, or [`HideawayError::Filesystem`] if a source cannot be
    /// made absolute.
    pub fn unprivileged(descriptor: &ContainerDescriptor, config: &ShimConfig) -> Result<Self> {
        if let Some(bm) = descriptor.bind_mounts.iter().find(|bm| bm.mode.is_read_only()) {
            return Err(HideawayError::ReadOnlyBindMountUnsupported {
                dst: bm.dst_path.clone(),
            });
        }

        let steps = descriptor
            .bind_mounts
            .iter()
            .map(|bm| {
                let dst = confine::join(
                    descriptor.work_dir(),
                    &bm.dst_path,
                    config.confine_destinations,
                )?;
                let src =
                    std::path::absolute(&bm.src_path).map_err(|e| HideawayError::Filesystem {
                        action: "resolve source path",
                        path: bm.src_path.clone(),
                        source: e,
                    })?;
                Ok(LinkStep { src, dst })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            work_dir: descriptor.work_dir().to_path_buf(),
            steps,
        })
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[LinkStep] {
        &self.steps
    }

    /// Replaces each destination with a link, creating parents as needed.
    ///
    /// With confinement on, a destination reached through a symlinked
    /// directory (including a link made by an earlier step) is refused
    /// before anything at it is removed.
    ///
    /// # Errors
    ///
    /// Returns the first [`HideawayError::PathEscape`],
    /// [`HideawayError::Filesystem`] or [`HideawayError::Link`] encountered.
    pub fn apply(&self, config: &ShimConfig) -> Result<()> {
        for step in &self.steps {
            if config.confine_destinations {
                confine::check_ancestors(&self.work_dir, &step.dst)?;
            }
            remove_existing(&step.dst)?;
            if let Some(parent) = step.dst.parent() {
                super::create_dir_all(parent, config.dir_mode, "create parent dir for bind mount")?;
            }
            symlink(&step.src, &step.dst).map_err(|e| HideawayError::Link {
                src: step.src.clone(),
                dst: step.dst.clone(),
                source: e,
            })?;
            tracing::debug!(src = %step.src.display(), dst = %step.dst.display(), "linked");
        }
        Ok(())
    }
}

impl fmt::Display for LinkPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Removes whatever is at `path`, without following a final symlink.
fn remove_existing(path: &Path) -> Result<()> {
    let to_err = |e: io::Error| HideawayError::Filesystem {
        action: "remove destination for bind mount",
        path: path.to_path_buf(),
        source: e,
    };
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(to_err),
        Ok(_) => fs::remove_file(path).map_err(to_err),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(to_err(e)),
    }
}

#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Emulates the descriptor's bind mounts with symlinks.
///
/// # Errors
///
/// Fails before touching the filesystem if any mount is read-only;
/// otherwise returns the first link failure.
pub fn setup_unprivileged(descriptor: &ContainerDescriptor, config: &ShimConfig) -> Result<()> {
    let plan = LinkPlan::unprivileged(descriptor, config)?;
    plan.apply(config)?;
    tracing::info!(id = %descriptor.id, links = plan.steps().len(), "unprivileged setup complete");
    Ok(())
}
