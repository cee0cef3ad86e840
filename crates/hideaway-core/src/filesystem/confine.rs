//! Lexical joining of container-relative paths onto the working directory.
//!
//! Destinations are always relative to the working directory, even when
//! written with a leading `/`. `..` is folded lexically. Before writing
//! through a destination, [`check_ancestors`] refuses any symlinked
//! directory between the working directory and the destination.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use hideaway_common::error::{HideawayError, Result};

/// Joins `relative` under `base`, rejecting any `..` that climbs above `base`.
///
/// # Errors
///
/// Returns [`HideawayError::PathEscape`] if the result would leave `base`.
pub fn confine(base: &Path, relative: &Path) -> Result<PathBuf> {
    let mut out = base.to_path_buf();
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(HideawayError::PathEscape {
                        path: relative.to_path_buf(),
                    });
                }
                let _ = out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }
    Ok(out)
}

/// Joins `relative` under `base` and folds `..` without any containment check.
#[must_use]
pub fn join_lexical(base: &Path, relative: &Path) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                let _ = out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Joins with or without confinement depending on `confined`.
///
/// # Errors
///
/// Returns [`HideawayError::PathEscape`] only when `confined` is set.
pub fn join(base: &Path, relative: &Path, confined: bool) -> Result<PathBuf> {
    if confined {
        confine(base, relative)
    } else {
        Ok(join_lexical(base, relative))
    }
}

/// Fails if an existing ancestor of `path` below `base` is a symlink.
///
/// `path` itself is not inspected. Once an ancestor is missing nothing
/// below it can exist, so the walk stops there.
///
/// # Errors
///
/// Returns [`HideawayError::PathEscape`] for a symlinked ancestor or a
/// `path` outside `base`, or [`HideawayError::Filesystem`] if an ancestor
/// cannot be inspected.
pub fn check_ancestors(base: &Path, path: &Path) -> Result<()> {
    let escape = || HideawayError::PathEscape {
        path: path.to_path_buf(),
    };
    let relative = path.strip_prefix(base).map_err(|_| escape())?;
    let Some(parent) = relative.parent() else {
        return Ok(());
    };

    let mut current = base.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Err(escape()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(HideawayError::Filesystem {
                    action: "inspect destination ancestor",
                    path: current,
                    source: e,
                });
            }
        }
    }
    Ok(())
}
