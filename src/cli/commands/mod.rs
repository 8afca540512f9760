//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the [`Workspace`] (root, merged config, paths)
//! 2. Takes the workspace lock if it mutates the change set
//! 3. Does its work, calling the engine for anything remote
//! 4. Saves the change set and formats output
//!
//! # Async Commands
//!
//! `commit`, `diff`, `health`, `history` and `pull` talk to the store. They build a `tokio` runtime and
//! `block_on` the engine so the rest of the CLI stays synchronous.

mod cat;
mod commit;
mod config_cmd;
mod diff;
mod health;
mod history;
mod init;
mod log_cmd;
mod ls;
mod pull;
mod put;
mod rm;
mod status;

pub use cat::cat;
pub use commit::commit;
pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use diff::diff;
pub use health::health;
pub use history::history;
pub use init::init;
pub use log_cmd::log;
pub use ls::ls;
pub use pull::pull;
pub use put::put;
pub use rm::rm;
pub use status::status;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use super::args::{Command, ConfigAction};
use super::Context;
use crate::core::changeset::ChangeSet;
use crate::core::config::Config;
use crate::core::ops::StageLock;
use crate::core::paths::StagePaths;
use crate::core::staging::StagingArea;
use crate::core::types::StagePath;
use crate::ui::output;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init {
            repo,
            branch,
            dir,
            force,
        } => init(ctx, repo.as_deref(), branch.as_deref(), dir.as_deref(), force),
        Command::Put { path, source } => put(ctx, &path, &source),
        Command::Cat { path } => cat(ctx, &path),
        Command::Rm { path } => rm(ctx, &path),
        Command::Ls { dir, filter } => ls(ctx, dir.as_deref(), filter.as_deref()),
        Command::Status => status(ctx),
        Command::Commit { message, dry_run } => commit(ctx, &message, dry_run),
        Command::Log { lines, search } => log(ctx, lines, search.as_deref()),
        Command::Diff => diff(ctx),
        Command::Pull => pull(ctx),
        Command::History { lines } => history(ctx, lines),
        Command::Health => health(ctx),
        Command::Config { action } => match action {
            Some(ConfigAction::Get { key }) => config_get(ctx, &key),
            Some(ConfigAction::Set { key, value }) => config_set(ctx, &key, &value),
            Some(ConfigAction::List) | None => config_list(ctx),
        },
    }
}

/// An opened workspace: root directory, merged config and derived paths.
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub paths: StagePaths,
}

impl Workspace {
    /// Resolve the root and load configuration. Config warnings are printed.
    pub fn open(ctx: &Context) -> Result<Self> {
        let root = match &ctx.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };

        let loaded =
            Config::load(&root, ctx.config.as_deref()).context("Failed to load configuration")?;
        for warning in &loaded.warnings {
            output::warn(
                format!("{} ({})", warning.message, warning.path.display()),
                ctx.verbosity(),
            );
        }

        let paths = loaded.config.paths(root.clone());
        Ok(Self {
            root,
            config: loaded.config,
            paths,
        })
    }

    /// Take the exclusive workspace lock.
    pub fn lock(&self) -> Result<StageLock> {
        StageLock::acquire(&self.paths).context("Failed to lock workspace")
    }

    /// Load the persisted change set.
    pub fn load_tracker(&self) -> Result<ChangeSet> {
        ChangeSet::load(&self.paths.changeset_path()).context("Failed to load change set")
    }

    /// Persist the change set.
    pub fn save_tracker(&self, tracker: &ChangeSet) -> Result<()> {
        tracker
            .save(&self.paths.changeset_path())
            .context("Failed to save change set")
    }

    /// The staging area, bound to `tracker`.
    pub fn staging(&self, tracker: ChangeSet) -> StagingArea {
        StagingArea::new(self.paths.staging_dir(), tracker)
    }
}

/// Parse a user-supplied staging path.
fn stage_path(raw: &str) -> Result<StagePath> {
    StagePath::new(raw).with_context(|| format!("Invalid path '{}'", raw))
}

/// Build the runtime for store calls.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start async runtime")
}
