//! Filesystem preparation for container isolation.
//!
//! Provides the bind-mount planner used by privileged containers, the
//! symlink linker used by unprivileged ones, destination confinement, and
//! the platform-gated mount and root-change primitives.

pub mod confine;
pub mod link;
pub mod mount;
pub mod plan;
pub mod root;

use std::path::Path;

use hideaway_common::config::ShimConfig;
use hideaway_common::error::{HideawayError, Result};
use hideaway_common::types::ContainerDescriptor;

use crate::capability::{HostCapabilities, Strategy, select_strategy};

pub use link::{LinkPlan, setup_unprivileged};
pub use mount::Mounter;
pub use plan::{MountJournal, MountPlan, setup_privileged};
pub use root::RootChange;

/// Prepares the container's filesystem view with whichever strategy applies.
///
/// Bind mounts completed before a failure are recorded in `journal` so the
/// caller can tear them down; nothing is retried or rolled back here.
///
/// # Errors
///
/// Returns the first failure of strategy selection, planning, or any
/// filesystem or mount step.
pub fn setup<H>(
    descriptor: &ContainerDescriptor,
    host: &H,
    config: &ShimConfig,
    journal: &mut MountJournal,
) -> Result<Strategy>
where
    H: HostCapabilities + Mounter + ?Sized,
{
    let strategy = select_strategy(descriptor, host)?;
    tracing::info!(
        id = %descriptor.id,
        work_dir = %descriptor.work_dir.display(),
        %strategy,
        "preparing container filesystem"
    );
    match strategy {
        Strategy::Privileged => setup_privileged(descriptor, host, config, journal)?,
        Strategy::Unprivileged => setup_unprivileged(descriptor, config)?,
    }
    Ok(strategy)
}

/// Creates `path` and any missing parents with the given permission bits.
pub(crate) fn create_dir_all(path: &Path, mode: u32, action: &'static str) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    let _ = builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        let _ = builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path).map_err(|e| HideawayError::Filesystem {
        action,
        path: path.to_path_buf(),
        source: e,
    })
}
