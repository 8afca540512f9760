//! cli
//!
//! Command-line interface layer for stagepush.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and the persisted change set
//! - Delegate publishing to the [`crate::engine`]
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers open a [`commands::Workspace`], do their
//! local bookkeeping and hand the store work to the engine on a `tokio`
//! runtime.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;
use std::path::PathBuf;

use crate::ui::output::Verbosity;

/// Execution context built from global flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Global config file override.
    pub config: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        cwd: cli.cwd.clone(),
        config: cli.config.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
