//! init command - Create the workspace configuration

use std::fs;

use anyhow::{Context as _, Result};

use super::Workspace;
use crate::cli::Context;
use crate::core::config::{ConfigFile, RemoteSection, StagingSection};
use crate::core::config::Config;
use crate::core::paths::StagePaths;
use crate::ui::output;

/// Initialize a workspace.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `repo` - Repository, `owner/name` or a GitHub URL
/// * `branch` - Branch to publish to
/// * `dir` - Staging directory
/// * `force` - Overwrite an existing workspace config
pub fn init(
    ctx: &Context,
    repo: Option<&str>,
    branch: Option<&str>,
    dir: Option<&str>,
    force: bool,
) -> Result<()> {
    let root = match &ctx.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let config_path = StagePaths::config_path_for(&root);
    if config_path.exists() && !force {
        output::print(
            "stagepush is already initialized in this directory.\nUse --force to overwrite.",
            ctx.verbosity(),
        );
        return Ok(());
    }

    let remote = (repo.is_some() || branch.is_some()).then(|| RemoteSection {
        repo: repo.map(str::to_string),
        branch: branch.map(str::to_string),
        ..Default::default()
    });
    let staging = dir.map(|d| StagingSection {
        dir: Some(d.to_string()),
        ..Default::default()
    });
    let file = ConfigFile {
        remote,
        staging,
        ..Default::default()
    };

    let written = Config::write_workspace(&root, &file).context("Failed to write config")?;

    let workspace = Workspace::open(ctx)?;
    let staging_dir = workspace.paths.staging_dir();
    fs::create_dir_all(&staging_dir)
        .with_context(|| format!("Failed to create {}", staging_dir.display()))?;

    output::success(
        format!(
            "Initialized stagepush in {}\n  repository: {}\n  branch:     {}\n  staging:    {}",
            root.display(),
            workspace.config.repo().unwrap_or("(not set)"),
            workspace.config.branch()?,
            staging_dir.display()
        ),
        ctx.verbosity(),
    );
    if workspace.config.repo().is_none() {
        output::warn(
            format!(
                "no repository configured in {}; run 'stagepush config set remote.repo owner/name' or set GITHUB_REPO",
                written.display()
            ),
            ctx.verbosity(),
        );
    }
    Ok(())
}
