//! Bind mount primitive.
//!
//! [`Mounter`] is the seam between the planner and `mount(2)`; tests and
//! embedders substitute their own implementation.

use std::path::Path;

use hideaway_common::error::{HideawayError, Result};

use crate::capability::NativeHost;
#[cfg(not(target_os = "linux"))]
use crate::capability::HostCapabilities;

/// Performs and reverses bind mounts.
pub trait Mounter {
    /// Binds `src` onto the existing `dst`, read-only if requested.
    ///
    /// # Errors
    ///
    /// Returns [`HideawayError::Mount`] if the syscall fails.
    fn bind_mount(&self, src: &Path, dst: &Path, read_only: bool) -> Result<()>;

    /// Detaches the mount at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`HideawayError::Unmount`] if the syscall fails.
    fn unmount(&self, target: &Path) -> Result<()>;
}

impl<T: Mounter + ?Sized> Mounter for &T {
    fn bind_mount(&self, src: &Path, dst: &Path, read_only: bool) -> Result<()> {
        (**self).bind_mount(src, dst, read_only)
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        (**self).unmount(target)
    }
}

/// Flags for the initial bind: `MS_BIND`, plus `MS_RDONLY` when read-only.
#[cfg(target_os = "linux")]
#[must_use]
pub fn bind_flags(read_only: bool) -> nix::mount::MsFlags {
    use nix::mount::MsFlags;

    let mut flags = MsFlags::MS_BIND;
    if read_only {
        flags |= MsFlags::MS_RDONLY;
    }
    flags
}

/// Flags for the remount that makes a bind read-only.
///
/// The kernel ignores `MS_RDONLY` on the initial `MS_BIND` call, so the
/// read-only bit only takes effect through a second remount.
#[cfg(target_os = "linux")]
#[must_use]
pub fn read_only_remount_flags() -> nix::mount::MsFlags {
    use nix::mount::MsFlags;

    MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY
}

#[cfg(target_os = "linux")]
impl Mounter for NativeHost {
    fn bind_mount(&self, src: &Path, dst: &Path, read_only: bool) -> Result<()> {
        use nix::mount::mount;

        let to_err = |e: nix::Error| HideawayError::Mount {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            source: e.into(),
        };

        mount(
            Some(src),
            dst,
            None::<&str>,
            bind_flags(read_only),
            None::<&str>,
        )
        .map_err(to_err)?;

        if read_only {
            mount(
                None::<&str>,
                dst,
                None::<&str>,
                read_only_remount_flags(),
                None::<&str>,
            )
            .map_err(to_err)?;
        }

        tracing::debug!(
            src = %src.display(),
            dst = %dst.display(),
            read_only,
            "bind mounted"
        );
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(|e| {
            HideawayError::Unmount {
                target: target.to_path_buf(),
                source: e.into(),
            }
        })?;
        tracing::debug!(target = %target.display(), "unmounted");
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl Mounter for NativeHost {
    fn bind_mount(&self, _src: &Path, _dst: &Path, _read_only: bool) -> Result<()> {
        Err(HideawayError::PrivilegedUnsupported { os: self.os() })
    }

    fn unmount(&self, _target: &Path) -> Result<()> {
        Err(HideawayError::PrivilegedUnsupported { os: self.os() })
    }
}
