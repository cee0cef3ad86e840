//! `hideaway run`: launch a process inside the container.

use std::path::PathBuf;

use clap::Args;
use hideaway_common::types::ProcessSpec;
use hideaway_core::Shim;

use crate::launch;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Working directory inside the container.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Extra environment variable, `KEY=VALUE`; repeatable.
    #[arg(long = "env", short = 'e', value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Prepare the filesystem view before launching.
    #[arg(long)]
    pub setup: bool,

    /// Program and arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command and exits with the child's status.
///
/// # Errors
///
/// Returns an error if setup, command construction, or spawning fails.
pub fn execute(shim: &Shim, args: RunArgs) -> anyhow::Result<()> {
    if args.setup {
        let _ = shim.setup()?;
    }

    let mut command = args.command.into_iter();
    let program = command
        .next()
        .ok_or_else(|| anyhow::anyhow!("no program given"))?;
    let spec = ProcessSpec {
        path: program,
        args: command.collect(),
        env: args.env,
        dir: args.dir,
    };

    let invocation = shim.command(&spec)?;
    let status = launch::run(&invocation, *shim.host())?;
    tracing::info!(id = %shim.descriptor().id, %status, "process exited");

    std::process::exit(status.code().unwrap_or(-1));
}

/// Parses `KEY=VALUE`.
fn parse_env(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))
}
