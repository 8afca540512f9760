//! diff command - Compare the staging area with the remote branch

use anyhow::{Context as _, Result};

use super::{runtime, Workspace};
use crate::cli::Context;
use crate::engine::{diff_remote, Deadline};
use crate::store::create_store;
use crate::ui::output;

/// Print added, deleted and modified paths relative to the branch head.
pub fn diff(ctx: &Context) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let tracker = workspace.load_tracker()?;
    let staging = workspace.staging(tracker.clone());
    let branch = workspace.config.branch()?;

    let store = create_store(&workspace.config).context("Failed to connect to the remote")?;
    let deadline = Deadline::after(workspace.config.timeout());
    let diff = runtime()?
        .block_on(diff_remote(store.as_ref(), &branch, &staging, &tracker, &deadline))
        .context("Failed to compare with the remote")?;

    let verbosity = ctx.verbosity();
    match &diff.head {
        Some(head) => output::print(
            format!("comparing with {} at {}", branch, head.short(7)),
            verbosity,
        ),
        None => output::print(format!("{} does not exist yet", branch), verbosity),
    }

    for path in &diff.added {
        output::data(format!("A {}", path));
    }
    for path in &diff.modified {
        output::data(format!("M {}", path));
    }
    for path in &diff.deleted {
        output::data(format!("D {}", path));
    }
    if diff.is_clean() {
        output::print("staging area matches the remote", verbosity);
    }
    if !diff.dirty.is_empty() {
        output::print(
            format!(
                "{} waiting to be committed",
                output::format_count(diff.dirty.len(), "dirty file")
            ),
            verbosity,
        );
    }
    Ok(())
}
