//! Host capability probing and isolation strategy selection.
//!
//! The decision is injected through [`HostCapabilities`] instead of being a
//! compile-time platform check, so both strategies can be exercised on any
//! build host.

use std::fmt;

use hideaway_common::error::{HideawayError, Result};
use hideaway_common::types::ContainerDescriptor;

/// Isolation strategy applied to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Bind mounts plus a filesystem-root change.
    Privileged,
    /// Symbolic links, host filesystem root.
    Unprivileged,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Privileged => write!(f, "privileged"),
            Self::Unprivileged => write!(f, "unprivileged"),
        }
    }
}

/// Probe for whether the host can bind mount and change roots.
pub trait HostCapabilities {
    /// Returns whether the privileged strategy is available.
    fn supports_privileged(&self) -> bool;

    /// Host operating system name, used in error messages.
    fn os(&self) -> &'static str {
        std::env::consts::OS
    }
}

impl<T: HostCapabilities + ?Sized> HostCapabilities for &T {
    fn supports_privileged(&self) -> bool {
        (**self).supports_privileged()
    }

    fn os(&self) -> &'static str {
        (**self).os()
    }
}

/// The running host, backed by real syscalls.
///
/// Bind mounts and `chroot(2)` are only attempted on Linux; elsewhere the
/// privileged operations return [`HideawayError::PrivilegedUnsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost;

impl HostCapabilities for NativeHost {
    fn supports_privileged(&self) -> bool {
        cfg!(target_os = "linux")
    }
}

/// A host with a fixed answer, for embedding and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticHost {
    /// Whether the privileged strategy is reported as available.
    pub privileged: bool,
}

impl HostCapabilities for StaticHost {
    fn supports_privileged(&self) -> bool {
        self.privileged
    }
}

/// Returns `true` only if the container asks for privilege and the host can honour it.
pub fn is_privileged<H: HostCapabilities + ?Sized>(
    descriptor: &ContainerDescriptor,
    host: &H,
) -> bool {
    descriptor.privileged && host.supports_privileged()
}

/// Picks the strategy for a container.
///
/// A privileged request on a host without support is rejected rather than
/// downgraded, so setup and launch never disagree about isolation.
///
/// # Errors
///
/// Returns [`HideawayError::PrivilegedUnsupported`] when the descriptor is
/// privileged and the host cannot provide it.
pub fn select_strategy<H: HostCapabilities + ?Sized>(
    descriptor: &ContainerDescriptor,
    host: &H,
) -> Result<Strategy> {
    if !descriptor.privileged {
        return Ok(Strategy::Unprivileged);
    }
    if host.supports_privileged() {
        Ok(Strategy::Privileged)
    } else {
        tracing::warn!(id = %descriptor.id, os = host.os(), "privileged isolation requested on unsupported host");
        Err(HideawayError::PrivilegedUnsupported { os: host.os() })
    }
}
