//! log command - Show the commit log

use anyhow::{Context as _, Result};

use super::Workspace;
use crate::cli::Context;
use crate::core::ops::CommitLog;
use crate::ui::output;

/// Print the newest `lines` log entries, newest first. `0` prints all.
pub fn log(ctx: &Context, lines: usize, search: Option<&str>) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let log = CommitLog::new(workspace.paths.commit_log_path());

    let limit = if lines == 0 { usize::MAX } else { lines };
    let entries = log
        .tail(limit, search)
        .context("Failed to read commit log")?;

    if entries.is_empty() {
        output::print("no commits recorded", ctx.verbosity());
    }
    for entry in entries {
        output::data(entry);
    }
    Ok(())
}
