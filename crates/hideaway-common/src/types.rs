//! Input contracts handed to the shim by the lifecycle manager.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::PATH_VAR;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindMountMode {
    /// The container sees the source read-only.
    #[serde(rename = "ro")]
    ReadOnly,
    /// The container may write through to the source.
    #[default]
    #[serde(rename = "rw")]
    ReadWrite,
}

impl BindMountMode {
    /// Returns `true` for [`BindMountMode::ReadOnly`].
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

impl fmt::Display for BindMountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "ro"),
            Self::ReadWrite => write!(f, "rw"),
        }
    }
}

/// A host path exposed at a destination inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMountSpec {
    /// Path on the host.
    pub src_path: PathBuf,
    /// Destination, always interpreted relative to the working directory.
    pub dst_path: PathBuf,
    /// Access mode.
    #[serde(default)]
    pub mode: BindMountMode,
}

impl BindMountSpec {
    /// Creates a read-write bind mount.
    #[must_use]
    pub fn read_write(src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self {
            src_path: src.into(),
            dst_path: dst.into(),
            mode: BindMountMode::ReadWrite,
        }
    }

    /// Creates a read-only bind mount.
    #[must_use]
    pub fn read_only(src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self {
            src_path: src.into(),
            dst_path: dst.into(),
            mode: BindMountMode::ReadOnly,
        }
    }
}

/// Logical description of one container, fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// Identifier used in log fields.
    #[serde(default)]
    pub id: ContainerId,
    /// Host directory owned by this container; root of its filesystem view.
    pub work_dir: PathBuf,
    /// Whether `work_dir` holds a full root filesystem.
    #[serde(default)]
    pub has_rootfs: bool,
    /// Whether privileged isolation was requested.
    #[serde(default)]
    pub privileged: bool,
    /// Environment shared by every process in the container.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// User-requested bind mounts, applied in order.
    #[serde(default)]
    pub bind_mounts: Vec<BindMountSpec>,
}

impl ContainerDescriptor {
    /// Creates an unprivileged, rootfs-less descriptor for `work_dir`.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: ContainerId::generate(),
            work_dir: work_dir.into(),
            has_rootfs: false,
            privileged: false,
            env: Vec::new(),
            bind_mounts: Vec::new(),
        }
    }

    /// Sets the container identifier.
    #[must_use]
    pub fn id(mut self, id: ContainerId) -> Self {
        self.id = id;
        self
    }

    /// Declares whether the working directory holds a root filesystem.
    #[must_use]
    pub const fn rootfs(mut self, has_rootfs: bool) -> Self {
        self.has_rootfs = has_rootfs;
        self
    }

    /// Requests privileged isolation.
    #[must_use]
    pub const fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Adds a bind mount.
    #[must_use]
    pub fn bind_mount(mut self, spec: BindMountSpec) -> Self {
        self.bind_mounts.push(spec);
        self
    }

    /// Returns the working directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Returns the container's `PATH` override.
    ///
    /// The last `PATH` entry wins; an empty value counts as no override.
    #[must_use]
    pub fn env_path(&self) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == PATH_VAR)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// A single process launch request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Bare program name or path.
    pub path: String,
    /// Arguments, excluding the program itself.
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-process environment overrides.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Requested working directory, relative to the container root.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl ProcessSpec {
    /// Creates a spec for `path` with no arguments.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the argument list.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an environment override.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}
