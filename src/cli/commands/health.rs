//! health command - Check that the remote branch is reachable

use anyhow::{Context as _, Result};

use super::{runtime, Workspace};
use crate::cli::Context;
use crate::engine::{check_health, Deadline};
use crate::store::create_store;
use crate::ui::output;

/// Contact the store, read the branch head, and report.
///
/// Fails (non-zero exit) when the remote is unhealthy.
pub fn health(ctx: &Context) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let branch = workspace.config.branch()?;

    let store = create_store(&workspace.config).context("Failed to connect to the remote")?;
    let deadline = Deadline::after(workspace.config.timeout());
    let report = runtime()?
        .block_on(check_health(store.as_ref(), &branch, &deadline))
        .context("Remote is unhealthy")?;

    let head = match &report.head {
        Some(head) => format!("{} at {}", report.branch, head.short(7)),
        None => format!("{} does not exist yet", report.branch),
    };
    output::success(format!("healthy ({}, {})", report.store, head), ctx.verbosity());
    Ok(())
}
