//! cat command - Print a staged file

use std::io::Write;

use anyhow::{Context as _, Result};

use super::{stage_path, Workspace};
use crate::cli::Context;

/// Write the raw bytes of a staged file to standard output.
pub fn cat(ctx: &Context, path: &str) -> Result<()> {
    let path = stage_path(path)?;
    let workspace = Workspace::open(ctx)?;
    let staging = workspace.staging(workspace.load_tracker()?);

    let content = staging.read(&path)?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&content)
        .and_then(|()| stdout.flush())
        .context("Failed to write to standard output")
}
