//! Filesystem-root change for privileged launches.
//!
//! Applied by the process executor in the child, after fork and before
//! exec. Only Linux provides it; other hosts get an error.

use std::path::Path;

use hideaway_common::error::{HideawayError, Result};

use crate::capability::NativeHost;
#[cfg(not(target_os = "linux"))]
use crate::capability::HostCapabilities;

/// Switches the calling process's filesystem root.
pub trait RootChange {
    /// Makes `root` the process's `/` and moves the working directory into it.
    ///
    /// # Errors
    ///
    /// Returns [`HideawayError::RootChange`] if the syscall fails, or
    /// [`HideawayError::PrivilegedUnsupported`] on hosts without it.
    fn change_root(&self, root: &Path) -> Result<()>;
}

#[cfg(target_os = "linux")]
impl RootChange for NativeHost {
    fn change_root(&self, root: &Path) -> Result<()> {
        let to_err = |e: nix::Error| HideawayError::RootChange {
            root: root.to_path_buf(),
            source: e.into(),
        };
        nix::unistd::chroot(root).map_err(to_err)?;
        nix::unistd::chdir("/").map_err(to_err)?;
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl RootChange for NativeHost {
    fn change_root(&self, _root: &Path) -> Result<()> {
        Err(HideawayError::PrivilegedUnsupported { os: self.os() })
    }
}
