//! commit command - Publish the dirty files as one commit
//!
//! # Algorithm
//!
//! 1. Take the workspace lock and load the change set
//! 2. `--dry-run`: print the preview and stop (no store is created)
//! 3. Empty change set: report and stop (no store is created)
//! 4. Run one publish cycle against the configured store
//! 5. Save the change set, whatever the outcome
//!
//! A failed cycle leaves every dirty path in place, so running the command
//! again retries the same batch.

use anyhow::{bail, Context as _, Result};

use super::{runtime, Workspace};
use crate::cli::Context;
use crate::core::ops::CommitLog;
use crate::core::types::StagePath;
use crate::engine::{self, ErrorKind, PublishCycle, PublishOutcome, PublishReport};
use crate::store::create_store;
use crate::ui::output::{self, format_count, format_list, Verbosity};

/// Publish every dirty file with `message`.
pub fn commit(ctx: &Context, message: &str, dry_run: bool) -> Result<()> {
    if message.trim().is_empty() {
        bail!("Commit message must not be empty");
    }

    let workspace = Workspace::open(ctx)?;
    let _lock = workspace.lock()?;
    let tracker = workspace.load_tracker()?;
    let staging = workspace.staging(tracker.clone());
    let branch = workspace.config.branch()?;
    let verbosity = ctx.verbosity();

    if dry_run {
        let preview = engine::preview(&tracker, &staging)?;
        if preview.is_empty() {
            output::print("nothing to publish", verbosity);
        } else {
            output::print(
                format!(
                    "would publish {} to {}:\n{}",
                    format_count(preview.files.len(), "file"),
                    branch,
                    format_list(&preview.files, "  ")
                ),
                verbosity,
            );
        }
        if !preview.missing.is_empty() {
            output::warn(
                format!("vanished: {}", join_paths(&preview.missing)),
                verbosity,
            );
        }
        return Ok(());
    }

    if tracker.is_empty() {
        output::print("nothing to publish", verbosity);
        return Ok(());
    }

    let store = create_store(&workspace.config).context("Failed to connect to the remote")?;
    let log = CommitLog::new(workspace.paths.commit_log_path());
    let cycle = PublishCycle::new(store.as_ref(), &staging, branch)
        .with_log(&log)
        .with_author(workspace.config.author())
        .with_missing_files(workspace.config.missing_files())
        .with_timeout(workspace.config.timeout());

    let result = runtime()?.block_on(cycle.run(&tracker, message));
    workspace.save_tracker(&tracker)?;

    match result {
        Ok(PublishOutcome::Published(report)) => {
            print_report(&report, verbosity);
            Ok(())
        }
        Ok(PublishOutcome::NothingToPublish { vanished }) => {
            if !vanished.is_empty() {
                output::warn(
                    format!(
                        "every staged file vanished, skipped {}",
                        format_count(vanished.len(), "file")
                    ),
                    verbosity,
                );
            }
            output::print("nothing to publish", verbosity);
            Ok(())
        }
        Err(e) => {
            let hint = match e.kind() {
                ErrorKind::Conflict => "the branch moved, run commit again to publish on top of it",
                ErrorKind::Transient => "the remote is unavailable, run commit again later",
                ErrorKind::Fatal => "nothing was published",
            };
            Err(anyhow::Error::new(e).context(format!(
                "Publish failed, {} kept ({})",
                format_count(tracker.len(), "staged file"),
                hint
            )))
        }
    }
}

fn print_report(report: &PublishReport, verbosity: Verbosity) {
    output::success(
        format!(
            "published {} as {} on {}",
            format_count(report.files.len(), "file"),
            report.commit.short(7),
            match &report.parent {
                Some(parent) => format!("top of {}", parent.short(7)),
                None => "a new branch".to_string(),
            }
        ),
        verbosity,
    );
    if verbosity == Verbosity::Debug {
        output::print(format_list(&report.files, "  "), verbosity);
    }
    if !report.skipped.is_empty() {
        output::warn(
            format!("skipped vanished: {}", join_paths(&report.skipped)),
            verbosity,
        );
    }
    if let Some(warning) = &report.log_warning {
        output::warn(format!("commit log not updated: {}", warning), verbosity);
    }
}

fn join_paths(paths: &[StagePath]) -> String {
    paths
        .iter()
        .map(StagePath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
