//! status command - Show what the next commit would publish

use anyhow::Result;

use super::Workspace;
use crate::cli::Context;
use crate::core::config::MissingFilePolicy;
use crate::engine;
use crate::ui::output::{self, format_count, format_list};

/// Show dirty files, split into publishable and vanished.
pub fn status(ctx: &Context) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let tracker = workspace.load_tracker()?;
    let staging = workspace.staging(tracker.clone());
    let verbosity = ctx.verbosity();

    let branch = workspace.config.branch()?;
    output::print(
        format!(
            "repository: {}\nbranch:     {}",
            workspace.config.repo().unwrap_or("(not set)"),
            branch
        ),
        verbosity,
    );

    let preview = engine::preview(&tracker, &staging)?;
    if preview.is_empty() && preview.missing.is_empty() {
        output::print("nothing to publish", verbosity);
        return Ok(());
    }

    if !preview.files.is_empty() {
        output::print(
            format!("\n{} to publish:", format_count(preview.files.len(), "file")),
            verbosity,
        );
        output::data(format_list(&preview.files, "  "));
    }
    if !preview.missing.is_empty() {
        let effect = match workspace.config.missing_files() {
            MissingFilePolicy::Skip => "will be skipped",
            MissingFilePolicy::Fail => "commit will fail",
        };
        output::print(
            format!(
                "\n{} vanished ({}):",
                format_count(preview.missing.len(), "file"),
                effect
            ),
            verbosity,
        );
        output::data(format_list(&preview.missing, "  "));
    }
    Ok(())
}
