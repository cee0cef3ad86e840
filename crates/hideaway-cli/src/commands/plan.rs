//! `hideaway plan`: show what setup would do.

use clap::Args;
use hideaway_core::Shim;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {}

/// Executes the `plan` command.
///
/// Prints the selected strategy followed by one line per mount or link.
///
/// # Errors
///
/// Returns an error if the strategy is unavailable or planning fails.
#[allow(clippy::print_stdout)]
pub fn execute(shim: &Shim, _args: &PlanArgs) -> anyhow::Result<()> {
    let strategy = shim.strategy()?;
    let plan = shim.plan()?;
    println!("strategy: {strategy}");
    print!("{plan}");
    Ok(())
}
