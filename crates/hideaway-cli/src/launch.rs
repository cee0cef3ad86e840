//! Turns an [`Invocation`] into a running child process.
//!
//! The child starts from an empty environment and receives exactly the
//! invocation's variables. With a root change, the child switches root and
//! then enters `dir` inside it, after fork and before exec.

#![allow(unsafe_code)]

use std::process::{Command, ExitStatus};

use anyhow::Context;
use hideaway_core::Invocation;
use hideaway_core::filesystem::RootChange;

/// Builds the command for `invocation` without spawning it.
///
/// When `invocation.root` is set, the command must be spawned from a
/// single-threaded process: the root change runs between fork and exec.
///
/// # Errors
///
/// Returns an error if a root change is requested on a platform without
/// `pre_exec` support.
pub fn command<R>(invocation: &Invocation, root_changer: R) -> anyhow::Result<Command>
where
    R: RootChange + Send + Sync + 'static,
{
    let mut cmd = Command::new(&invocation.program);
    let _ = cmd
        .args(&invocation.args)
        .env_clear()
        .envs(invocation.env.iter().map(|(k, v)| (k, v)));

    match &invocation.root {
        None => {
            let _ = cmd.current_dir(&invocation.dir);
        }
        Some(root) => enter_root(&mut cmd, root.clone(), invocation.dir.clone(), root_changer)?,
    }
    Ok(cmd)
}

#[cfg(unix)]
fn enter_root<R>(
    cmd: &mut Command,
    root: std::path::PathBuf,
    dir: std::path::PathBuf,
    root_changer: R,
) -> anyhow::Result<()>
where
    R: RootChange + Send + Sync + 'static,
{
    use std::os::unix::process::CommandExt;

    // SAFETY: the hook runs in the forked child before exec and issues only
    // chroot(2) and chdir(2). Path conversion and the error path may allocate,
    // which is sound only because the CLI forks from a single thread, so no
    // other thread can hold the allocator lock at fork time.
    let _ = unsafe {
        cmd.pre_exec(move || {
            root_changer
                .change_root(&root)
                .map_err(std::io::Error::other)?;
            std::env::set_current_dir(&dir)
        })
    };
    Ok(())
}

#[cfg(not(unix))]
fn enter_root<R>(
    _cmd: &mut Command,
    root: std::path::PathBuf,
    _dir: std::path::PathBuf,
    _root_changer: R,
) -> anyhow::Result<()>
where
    R: RootChange + Send + Sync + 'static,
{
    anyhow::bail!("cannot change root to {} on this platform", root.display())
}

/// Spawns `invocation` and waits for it to exit.
///
/// # Errors
///
/// Returns an error if the process cannot be started or waited on.
pub fn run<R>(invocation: &Invocation, root_changer: R) -> anyhow::Result<ExitStatus>
where
    R: RootChange + Send + Sync + 'static,
{
    let mut cmd = command(invocation, root_changer)?;
    tracing::info!(
        program = %invocation.program.display(),
        args = ?invocation.args,
        root = ?invocation.root,
        "launching process"
    );
    cmd.status()
        .with_context(|| format!("launching {}", invocation.program.display()))
}
