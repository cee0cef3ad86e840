//! Executable lookup scoped to a container.
//!
//! Follows shell `PATH` semantics: names containing a separator are checked
//! as-is, bare names are tried against each search path segment in order,
//! and an empty segment means the current directory. For containers with a
//! root filesystem every segment is re-rooted under the working directory.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hideaway_common::config::ShimConfig;
use hideaway_common::constants::EXECUTABLE_BITS;
use hideaway_common::types::ContainerDescriptor;
use thiserror::Error;

use crate::filesystem::confine;

/// Why a program could not be resolved.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No candidate exists.
    #[error("executable file not found in search path: {name}")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A candidate exists but is a directory or has no execute bit.
    #[error("permission denied: {} is not executable", path.display())]
    NotExecutable {
        /// First candidate that exists but cannot be executed.
        path: PathBuf,
    },

    /// The candidate could not be inspected.
    #[error("failed to inspect {}: {source}", path.display())]
    Io {
        /// Candidate path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A rebased segment could not be joined back into a search path.
    #[error("invalid search path: {0}")]
    InvalidSearchPath(String),
}

/// Checks that `path` is a non-directory with at least one execute bit.
///
/// # Errors
///
/// Returns [`LookupError::NotFound`] if nothing exists at `path`,
/// [`LookupError::NotExecutable`] if it exists but cannot be run.
pub fn find_executable(path: &Path) -> Result<(), LookupError> {
    let meta = fs::metadata(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            LookupError::NotFound {
                name: path.display().to_string(),
            }
        } else {
            LookupError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    if !meta.is_dir() && is_executable(&meta) {
        Ok(())
    } else {
        Err(LookupError::NotExecutable {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & EXECUTABLE_BITS != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    true
}

/// Resolves `name` against `search_path`.
///
/// The first segment holding an executable wins and later segments are not
/// inspected. If no segment matches but some segment held a non-executable
/// candidate, that is reported instead of not-found.
///
/// # Errors
///
/// Returns [`LookupError::NotFound`] or [`LookupError::NotExecutable`].
pub fn look_path(name: &str, search_path: &OsStr) -> Result<PathBuf, LookupError> {
    if name.is_empty() {
        return Err(LookupError::NotFound { name: String::new() });
    }

    if name.contains('/') {
        let path = Path::new(name);
        return match find_executable(path) {
            Ok(()) => Ok(path.to_path_buf()),
            Err(LookupError::NotFound { .. }) => Err(LookupError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        };
    }

    let mut denied = None;
    for dir in std::env::split_paths(search_path) {
        // POSIX: an empty segment means the current directory.
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir
        };
        let candidate = dir.join(name);
        match find_executable(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(LookupError::NotExecutable { path }) if denied.is_none() => denied = Some(path),
            Err(_) => {}
        }
    }

    Err(denied.map_or_else(
        || LookupError::NotFound {
            name: name.to_string(),
        },
        |path| LookupError::NotExecutable { path },
    ))
}

/// Builds the search path for lookups inside `descriptor`.
///
/// Without a root filesystem the container's `PATH` override, or else
/// `host_path`, is returned untouched. With one, the override or the
/// configured root default is re-rooted segment by segment under the
/// working directory.
///
/// # Errors
///
/// Returns [`LookupError::InvalidSearchPath`] if a rebased segment cannot be
/// joined back together.
pub fn container_search_path(
    descriptor: &ContainerDescriptor,
    host_path: Option<&OsStr>,
    config: &ShimConfig,
) -> Result<OsString, LookupError> {
    let override_path = descriptor.env_path();

    if !descriptor.has_rootfs {
        return Ok(override_path
            .map(OsString::from)
            .or_else(|| host_path.map(OsStr::to_os_string))
            .unwrap_or_default());
    }

    let path = override_path.unwrap_or(&config.default_root_path);
    let scoped = std::env::split_paths(path)
        .map(|dir| confine::join_lexical(descriptor.work_dir(), &dir));
    std::env::join_paths(scoped).map_err(|e| LookupError::InvalidSearchPath(e.to_string()))
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn write_file(path: &Path, mode: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn search_path(dirs: &[PathBuf]) -> OsString {
        std::env::join_paths(dirs).unwrap()
    }

    #[test]
    fn first_matching_segment_wins() {
        let root = tempfile::tempdir().unwrap();
        let (a, b, c) = (root.path().join("a"), root.path().join("b"), root.path().join("c"));
        fs::create_dir_all(&a).unwrap();
        write_file(&b.join("tool"), 0o755);
        write_file(&c.join("tool"), 0o755);

        let found = look_path("tool", &search_path(&[a, b.clone(), c])).unwrap();
        assert_eq!(found, b.join("tool"));
    }

    #[test]
    fn lookup_stops_at_first_match() {
        let root = tempfile::tempdir().unwrap();
        let first = root.path().join("first");
        write_file(&first.join("tool"), 0o755);
        // A plain file used as a directory fails with ENOTDIR if inspected.
        let not_a_dir = root.path().join("plain");
        write_file(&not_a_dir, 0o644);
        let denied = root.path().join("denied");
        write_file(&denied.join("tool"), 0o644);

        let found = look_path("tool", &search_path(&[first.clone(), not_a_dir, denied])).unwrap();
        assert_eq!(found, first.join("tool"));
    }

    #[test]
    fn absent_everywhere_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let err = look_path("missing", &search_path(&[root.path().to_path_buf()])).unwrap_err();
        assert!(matches!(err, LookupError::NotFound { ref name } if name == "missing"));
    }

    #[test]
    fn non_executable_is_permission_error() {
        let root = tempfile::tempdir().unwrap();
        write_file(&root.path().join("data"), 0o644);
        let err = look_path("data", &search_path(&[root.path().to_path_buf()])).unwrap_err();
        assert!(matches!(err, LookupError::NotExecutable { .. }));
    }

    #[test]
    fn executable_later_beats_non_executable_earlier() {
        let root = tempfile::tempdir().unwrap();
        let (a, b) = (root.path().join("a"), root.path().join("b"));
        write_file(&a.join("tool"), 0o644);
        write_file(&b.join("tool"), 0o700);
        let found = look_path("tool", &search_path(&[a, b.clone()])).unwrap();
        assert_eq!(found, b.join("tool"));
    }

    #[test]
    fn directory_is_not_executable() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("tool")).unwrap();
        let err = look_path("tool", &search_path(&[root.path().to_path_buf()])).unwrap_err();
        assert!(matches!(err, LookupError::NotExecutable { .. }));
    }

    #[test]
    fn name_with_separator_is_checked_directly() {
        let root = tempfile::tempdir().unwrap();
        let tool = root.path().join("bin/tool");
        write_file(&tool, 0o755);
        let name = tool.to_str().unwrap();
        assert_eq!(look_path(name, OsStr::new("")).unwrap(), tool);

        let missing = root.path().join("bin/nope");
        let err = look_path(missing.to_str().unwrap(), OsStr::new("/bin")).unwrap_err();
        assert!(matches!(err, LookupError::NotFound { .. }));
    }

    #[test]
    fn rootless_search_path_prefers_override_then_host() {
        let config = ShimConfig::default();
        let d = ContainerDescriptor::new("/w").env("PATH", "/opt/bin");
        let p = container_search_path(&d, Some(OsStr::new("/usr/bin")), &config).unwrap();
        assert_eq!(p, OsString::from("/opt/bin"));

        let d = ContainerDescriptor::new("/w");
        let p = container_search_path(&d, Some(OsStr::new("/usr/bin")), &config).unwrap();
        assert_eq!(p, OsString::from("/usr/bin"));
    }

    #[test]
    fn rootfs_search_path_is_rebased_default() {
        let d = ContainerDescriptor::new("/w").rootfs(true);
        let p = container_search_path(&d, Some(OsStr::new("/host/bin")), &ShimConfig::default())
            .unwrap();
        assert_eq!(
            p,
            OsString::from(
                "/w/usr/local/sbin:/w/usr/local/bin:/w/usr/sbin:/w/usr/bin:/w/sbin:/w/bin"
            )
        );
    }

    #[test]
    fn rootfs_search_path_rebases_override() {
        let d = ContainerDescriptor::new("/w").rootfs(true).env("PATH", "/app/bin:/bin");
        let p = container_search_path(&d, None, &ShimConfig::default()).unwrap();
        assert_eq!(p, OsString::from("/w/app/bin:/w/bin"));
    }
}
