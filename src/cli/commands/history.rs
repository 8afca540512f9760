//! history command - Show commits on the remote branch

use anyhow::{Context as _, Result};

use super::{runtime, Workspace};
use crate::cli::Context;
use crate::engine::{history as remote_history, Deadline};
use crate::store::create_store;
use crate::ui::output;

/// Print the newest `lines` commits of the branch, one per line. `0` prints all.
pub fn history(ctx: &Context, lines: usize) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let branch = workspace.config.branch()?;

    let store = create_store(&workspace.config).context("Failed to connect to the remote")?;
    let deadline = Deadline::after(workspace.config.timeout());
    let entries = runtime()?
        .block_on(remote_history(store.as_ref(), &branch, lines, &deadline))
        .context("Failed to read remote history")?;

    if entries.is_empty() {
        output::print(format!("{} has no commits", branch), ctx.verbosity());
    }
    for entry in entries {
        let summary = entry.message.lines().next().unwrap_or_default();
        output::data(format!("{} {}", entry.commit.short(7), summary));
    }
    Ok(())
}
