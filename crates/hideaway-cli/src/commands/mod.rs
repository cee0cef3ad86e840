//! CLI command definitions and dispatch.

pub mod plan;
pub mod resolve;
pub mod run;
pub mod setup;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use hideaway_common::config::ShimConfig;
use hideaway_common::constants::APP_NAME;
use hideaway_common::types::ContainerDescriptor;
use hideaway_core::Shim;

/// Hideaway: prepare a container filesystem view and launch processes in it.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Container descriptor (JSON).
    #[arg(long, short, global = true, env = "HIDEAWAY_DESCRIPTOR", default_value = "container.json")]
    pub descriptor: PathBuf,

    /// Shim configuration (JSON); built-in defaults when absent.
    #[arg(long, global = true, env = "HIDEAWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the mounts or links setup would create, without applying them.
    Plan(plan::PlanArgs),
    /// Prepare the container's filesystem view.
    Setup(setup::SetupArgs),
    /// Resolve a program name as a launch inside the container would.
    Resolve(resolve::ResolveArgs),
    /// Launch a process inside the container and wait for it.
    Run(run::RunArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if loading inputs or the command itself fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let shim = load_shim(&cli.descriptor, cli.config.as_deref())?;
    match cli.command {
        Command::Plan(args) => plan::execute(&shim, &args),
        Command::Setup(args) => setup::execute(&shim, &args),
        Command::Resolve(args) => resolve::execute(&shim, &args),
        Command::Run(args) => run::execute(&shim, args),
    }
}

/// Reads a descriptor and optional config into a shim for the native host.
///
/// # Errors
///
/// Returns an error if either file is unreadable or malformed.
pub fn load_shim(descriptor: &Path, config: Option<&Path>) -> anyhow::Result<Shim> {
    let raw = std::fs::read_to_string(descriptor)
        .with_context(|| format!("reading descriptor {}", descriptor.display()))?;
    let descriptor: ContainerDescriptor = serde_json::from_str(&raw)
        .with_context(|| format!("parsing descriptor {}", descriptor.display()))?;

    let config = match config {
        Some(path) => ShimConfig::load(path)?,
        None => ShimConfig::default(),
    };

    tracing::debug!(id = %descriptor.id, work_dir = %descriptor.work_dir.display(), "descriptor loaded");
    Ok(Shim::new(descriptor).config(config))
}
