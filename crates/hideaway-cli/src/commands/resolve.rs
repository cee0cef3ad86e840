//! `hideaway resolve`: container-scoped executable lookup.

use clap::Args;
use hideaway_core::Shim;

/// Arguments for the `resolve` command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Bare program name.
    pub name: String,
}

/// Executes the `resolve` command, printing the host path of the program.
///
/// # Errors
///
/// Returns an error if the program cannot be found in the container.
#[allow(clippy::print_stdout)]
pub fn execute(shim: &Shim, args: &ResolveArgs) -> anyhow::Result<()> {
    let path = shim.resolve(&args.name)?;
    println!("{}", path.display());
    Ok(())
}
