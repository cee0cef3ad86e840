//! `hideaway setup`: prepare the container's filesystem view.

use clap::Args;
use hideaway_core::Shim;
use hideaway_core::filesystem::MountJournal;

/// Arguments for the `setup` command.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Unmount whatever was mounted if setup fails partway.
    #[arg(long)]
    pub rollback: bool,
}

/// Executes the `setup` command.
///
/// Runs setup once. On failure the mounts already made stay in place
/// unless `--rollback` is given.
///
/// # Errors
///
/// Returns the first setup failure.
pub fn execute(shim: &Shim, args: &SetupArgs) -> anyhow::Result<()> {
    let mut journal = MountJournal::new();
    match shim.setup_with_journal(&mut journal) {
        Ok(strategy) => {
            tracing::info!(id = %shim.descriptor().id, %strategy, "container ready");
            Ok(())
        }
        Err(e) => {
            if args.rollback && !journal.is_empty() {
                let failed = journal.rollback(shim.host());
                tracing::warn!(failed, "rolled back partial setup");
            } else if !journal.is_empty() {
                tracing::warn!(
                    mounted = journal.mounted().len(),
                    "partial setup left in place"
                );
            }
            Err(e.into())
        }
    }
}
