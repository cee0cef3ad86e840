//! Unified error types for the Hideaway workspace.
//!
//! Every failure in filesystem preparation or command construction is
//! reported immediately through one of these variants; nothing aggregates or
//! retries.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HideawayError {
    /// A filesystem preparation step (mkdir, create, remove, stat) failed.
    #[error("failed to {action} {path}: {source}")]
    Filesystem {
        /// Short description of the step, e.g. "create bind mount target".
        action: &'static str,
        /// Path the step operated on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A bind mount syscall failed.
    #[error("failed to bind mount {src} onto {dst}: {source}")]
    Mount {
        /// Host path being mounted.
        src: PathBuf,
        /// Mount target inside the working directory.
        dst: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// An unmount syscall failed.
    #[error("failed to unmount {target}: {source}")]
    Unmount {
        /// Mount target that could not be detached.
        target: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A symbolic link standing in for a bind mount could not be created.
    #[error("failed to link {dst} to {src}: {source}")]
    Link {
        /// Absolute link target on the host.
        src: PathBuf,
        /// Link location inside the working directory.
        dst: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Read-only bind mounts cannot be emulated without privilege.
    #[error("read-only bind mounts are unsupported without privilege (destination {dst})")]
    ReadOnlyBindMountUnsupported {
        /// Destination of the rejected mount.
        dst: PathBuf,
    },

    /// The host cannot perform bind mounts and root changes.
    #[error("privileged mode is unsupported on {os}")]
    PrivilegedUnsupported {
        /// Host operating system name.
        os: &'static str,
    },

    /// The requested program could not be located in the container.
    #[error("executable not found: {name}: {message}")]
    ExecutableNotFound {
        /// Program name as requested.
        name: String,
        /// Resolver diagnostic.
        message: String,
    },

    /// A destination or directory would resolve outside the working directory.
    #[error("path escapes the container working directory: {path}")]
    PathEscape {
        /// Offending path as supplied by the caller.
        path: PathBuf,
    },

    /// Changing the filesystem root failed.
    #[error("failed to change root to {root}: {source}")]
    RootChange {
        /// Requested new root.
        root: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl HideawayError {
    /// Returns `true` for deliberate capability rejections that must never be retried.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::ReadOnlyBindMountUnsupported { .. } | Self::PrivilegedUnsupported { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HideawayError>;
