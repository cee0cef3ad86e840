//! Construction of the process invocation for a launch request.
//!
//! Privileged containers with a root filesystem get a root change to the
//! working directory and paths expressed inside that root. Everything else
//! runs against the host root with the working directory as base.

use std::ffi::OsStr;
use std::path::{MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path, PathBuf};

use hideaway_common::config::ShimConfig;
use hideaway_common::constants::{PATH_VAR, ROOT_DIR};
use hideaway_common::error::{HideawayError, Result};
use hideaway_common::types::{ContainerDescriptor, ProcessSpec};

use crate::capability::{HostCapabilities, Strategy, select_strategy};
use crate::filesystem::confine;
use crate::path::{container_search_path, look_path};

/// Everything the executor needs to start one process.
///
/// When [`Invocation::root`] is set, the executor must change root first
/// and only then resolve `program` and `dir`, both of which are relative to
/// the new root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, excluding the program.
    pub args: Vec<String>,
    /// Working directory.
    pub dir: PathBuf,
    /// Host, then container, then process variables; duplicates are kept.
    pub env: Vec<(String, String)>,
    /// Filesystem root to switch to before exec.
    pub root: Option<PathBuf>,
}

impl Invocation {
    /// Returns the value the executor will see for `key` (last entry wins).
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Snapshot of the launching process's environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    /// Variables in host order.
    pub vars: Vec<(String, String)>,
}

impl HostEnv {
    /// Captures the current process environment.
    ///
    /// Variables that are not valid UTF-8 are skipped.
    #[must_use]
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Creates a snapshot from explicit variables.
    #[must_use]
    pub const fn from_vars(vars: Vec<(String, String)>) -> Self {
        Self { vars }
    }

    /// Returns the host `PATH`, if set.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == PATH_VAR)
            .map(|(_, v)| v.as_str())
    }
}

/// Builds the invocation for `spec` inside `descriptor`.
///
/// # Errors
///
/// Returns [`HideawayError::PrivilegedUnsupported`] for a privileged
/// container on an incapable host, [`HideawayError::ExecutableNotFound`]
/// when a bare name cannot be resolved in the root filesystem, and
/// [`HideawayError::PathEscape`] when the requested directory leaves the
/// working directory.
pub fn build_command<H: HostCapabilities + ?Sized>(
    descriptor: &ContainerDescriptor,
    spec: &ProcessSpec,
    host: &H,
    host_env: &HostEnv,
    config: &ShimConfig,
) -> Result<Invocation> {
    let mut invocation = match select_strategy(descriptor, host)? {
        Strategy::Privileged => privileged(descriptor, spec, host_env, config)?,
        Strategy::Unprivileged => unprivileged(descriptor, spec, config)?,
    };
    invocation.env = merged_env(host_env, descriptor, spec);
    tracing::debug!(
        id = %descriptor.id,
        program = %invocation.program.display(),
        dir = %invocation.dir.display(),
        root = ?invocation.root,
        "built invocation"
    );
    Ok(invocation)
}

fn privileged(
    descriptor: &ContainerDescriptor,
    spec: &ProcessSpec,
    host_env: &HostEnv,
    config: &ShimConfig,
) -> Result<Invocation> {
    if !descriptor.has_rootfs {
        return Ok(Invocation {
            program: PathBuf::from(&spec.path),
            args: spec.args.clone(),
            dir: launch_dir(descriptor, requested_dir(spec), config)?,
            env: Vec::new(),
            root: None,
        });
    }

    let program = if spec.path.contains('/') {
        PathBuf::from(&spec.path)
    } else {
        let resolved = resolve(descriptor, &spec.path, host_env, config)?;
        inside_root(descriptor.work_dir(), &resolved)?
    };

    let dir = requested_dir(spec).map_or_else(|| PathBuf::from(ROOT_DIR), Path::to_path_buf);

    Ok(Invocation {
        program,
        args: spec.args.clone(),
        dir,
        env: Vec::new(),
        root: Some(descriptor.work_dir().to_path_buf()),
    })
}

fn unprivileged(
    descriptor: &ContainerDescriptor,
    spec: &ProcessSpec,
    config: &ShimConfig,
) -> Result<Invocation> {
    let dir = requested_dir(spec).map(|d| from_slash(d.as_os_str()));
    Ok(Invocation {
        program: from_slash(OsStr::new(&spec.path)),
        args: spec.args.clone(),
        dir: launch_dir(descriptor, dir.as_deref(), config)?,
        env: Vec::new(),
        root: None,
    })
}

/// Resolves a bare `name` against the container's search path.
///
/// The result is a host path; for root filesystems it lies under the
/// working directory.
///
/// # Errors
///
/// Returns [`HideawayError::ExecutableNotFound`] wrapping the resolver's
/// diagnostic.
pub fn resolve(
    descriptor: &ContainerDescriptor,
    name: &str,
    host_env: &HostEnv,
    config: &ShimConfig,
) -> Result<PathBuf> {
    let not_found = |e: crate::path::LookupError| HideawayError::ExecutableNotFound {
        name: name.to_string(),
        message: e.to_string(),
    };
    let search = container_search_path(descriptor, host_env.path().map(OsStr::new), config)
        .map_err(not_found)?;
    look_path(name, &search).map_err(not_found)
}

/// Re-expresses a host path under `work_dir` as an absolute path inside it.
fn inside_root(work_dir: &Path, resolved: &Path) -> Result<PathBuf> {
    resolved
        .strip_prefix(work_dir)
        .map(|rel| Path::new(ROOT_DIR).join(rel))
        .map_err(|_| HideawayError::PathEscape {
            path: resolved.to_path_buf(),
        })
}

fn requested_dir(spec: &ProcessSpec) -> Option<&Path> {
    spec.dir.as_deref().filter(|d| !d.as_os_str().is_empty())
}

fn launch_dir(
    descriptor: &ContainerDescriptor,
    dir: Option<&Path>,
    config: &ShimConfig,
) -> Result<PathBuf> {
    confine::join(
        descriptor.work_dir(),
        dir.unwrap_or_else(|| Path::new("")),
        config.confine_destinations,
    )
}

/// Converts `/` separators to the platform separator.
///
/// Where `/` already is the separator the path passes through byte for byte.
fn from_slash(path: &OsStr) -> PathBuf {
    if MAIN_SEPARATOR == '/' {
        return PathBuf::from(path);
    }
    path.to_str().map_or_else(
        || PathBuf::from(path),
        |s| PathBuf::from(s.replace('/', MAIN_SEPARATOR_STR)),
    )
}

fn merged_env(
    host_env: &HostEnv,
    descriptor: &ContainerDescriptor,
    spec: &ProcessSpec,
) -> Vec<(String, String)> {
    host_env
        .vars
        .iter()
        .chain(&descriptor.env)
        .chain(&spec.env)
        .cloned()
        .collect()
}
