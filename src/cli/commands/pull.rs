//! pull command - Bring the staging area up to date with the remote branch
//!
//! Runs under the workspace lock. Dirty files are left as they are, and
//! pulled files are not marked dirty, so the change set is only read.

use anyhow::{Context as _, Result};

use super::{runtime, Workspace};
use crate::cli::Context;
use crate::engine::{pull as pull_head, Deadline};
use crate::store::create_store;
use crate::ui::output::{self, format_count, format_list, Verbosity};

/// Download every file of the branch head that differs locally.
pub fn pull(ctx: &Context) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let _lock = workspace.lock()?;
    let tracker = workspace.load_tracker()?;
    let staging = workspace.staging(tracker);
    let branch = workspace.config.branch()?;
    let verbosity = ctx.verbosity();

    let store = create_store(&workspace.config).context("Failed to connect to the remote")?;
    let deadline = Deadline::after(workspace.config.timeout());
    let report = runtime()?
        .block_on(pull_head(store.as_ref(), &branch, &staging, &deadline))
        .context("Pull failed")?;

    let Some(head) = &report.head else {
        output::print(format!("{} does not exist yet", branch), verbosity);
        return Ok(());
    };

    output::success(
        format!(
            "pulled {} from {} at {} ({} unchanged)",
            format_count(report.written.len(), "file"),
            branch,
            head.short(7),
            report.unchanged
        ),
        verbosity,
    );
    if verbosity == Verbosity::Debug && !report.written.is_empty() {
        output::print(format_list(&report.written, "  "), verbosity);
    }
    if !report.kept.is_empty() {
        output::warn(
            format!(
                "kept local changes to {}",
                format_count(report.kept.len(), "dirty file")
            ),
            verbosity,
        );
    }
    if !report.skipped.is_empty() {
        output::warn(
            format!("skipped {}", report.skipped.join(", ")),
            verbosity,
        );
    }
    Ok(())
}
