//! rm command - Delete a staged file

use anyhow::Result;

use super::{stage_path, Workspace};
use crate::cli::Context;
use crate::ui::output;

/// Delete a staged file.
///
/// The path stays dirty. At the next commit it counts as vanished and is
/// left out, so the file is not removed from the remote branch.
pub fn rm(ctx: &Context, path: &str) -> Result<()> {
    let path = stage_path(path)?;

    let workspace = Workspace::open(ctx)?;
    let _lock = workspace.lock()?;
    let tracker = workspace.load_tracker()?;
    let staging = workspace.staging(tracker.clone());

    staging.delete(&path)?;
    workspace.save_tracker(&tracker)?;

    output::success(format!("removed {}", path), ctx.verbosity());
    Ok(())
}
