//! ls command - List staged files

use anyhow::Result;

use super::{stage_path, Workspace};
use crate::cli::Context;
use crate::ui::output;

/// List staged files, optionally under `dir` and ending with `filter`.
pub fn ls(ctx: &Context, dir: Option<&str>, filter: Option<&str>) -> Result<()> {
    let dir = dir.map(stage_path).transpose()?;
    let workspace = Workspace::open(ctx)?;
    let staging = workspace.staging(workspace.load_tracker()?);

    for path in staging.list(dir.as_ref(), filter)? {
        output::data(path);
    }
    Ok(())
}
