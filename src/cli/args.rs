//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--config <file>`: Use this file instead of the global config
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stagepush - publish a staged file set as one commit through a git API
#[derive(Parser, Debug)]
#[command(name = "stagepush")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if stagepush was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Read global settings from this file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the workspace configuration and staging directory
    #[command(
        name = "init",
        long_about = "Create the workspace configuration and staging directory.\n\n\
            Writes .stagepush/config.toml in the workspace root. Values not given \
            on the command line fall back to the global config and the environment.",
        after_help = "\
EXAMPLES:
    stagepush init --repo octo/site
    stagepush init --repo https://github.com/octo/site --branch gh-pages --dir dist"
    )]
    Init {
        /// Repository as 'owner/name' or a GitHub URL
        #[arg(long)]
        repo: Option<String>,

        /// Branch to publish to
        #[arg(long)]
        branch: Option<String>,

        /// Staging directory, relative to the workspace root
        #[arg(long)]
        dir: Option<String>,

        /// Overwrite an existing workspace config
        #[arg(long)]
        force: bool,
    },

    /// Write a file into the staging area
    #[command(
        name = "put",
        after_help = "\
EXAMPLES:
    stagepush put index.html --from build/index.html
    stagepush put notes/today.md --content 'hello'
    echo hi | stagepush put greeting.txt"
    )]
    Put {
        /// Path inside the staging area
        path: String,

        #[command(flatten)]
        source: PutSource,
    },

    /// Print a staged file
    #[command(name = "cat")]
    Cat {
        /// Path inside the staging area
        path: String,
    },

    /// Delete a staged file
    #[command(name = "rm")]
    Rm {
        /// Path inside the staging area
        path: String,
    },

    /// List staged files
    #[command(name = "ls")]
    Ls {
        /// Only list files under this directory
        #[arg(long)]
        dir: Option<String>,

        /// Only list files whose path ends with this suffix
        #[arg(long, value_name = "SUFFIX")]
        filter: Option<String>,
    },

    /// Show the files waiting to be published
    #[command(name = "status")]
    Status,

    /// Publish every dirty file as one commit
    #[command(
        name = "commit",
        long_about = "Publish every dirty file as one commit.\n\n\
            Uploads the dirty files, layers them onto the branch head's tree, \
            creates one commit and advances the branch. If the branch moved \
            underneath, nothing is lost: the files stay dirty and the next \
            commit retries them.",
        after_help = "\
EXAMPLES:
    stagepush commit -m 'Update landing page'
    stagepush commit -m 'Preview' --dry-run"
    )]
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Show what would be published without contacting the remote
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the commit log
    #[command(name = "log")]
    Log {
        /// Number of entries to show (0 shows all)
        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,

        /// Only show entries containing this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Compare the staging area with the remote branch
    #[command(name = "diff")]
    Diff,

    /// Download the remote branch head into the staging area
    #[command(
        name = "pull",
        long_about = "Download the remote branch head into the staging area.\n\n\
            Files that differ from the head are downloaded and written without \
            being marked dirty. Dirty files are never overwritten, and local \
            files missing from the head are left in place."
    )]
    Pull,

    /// Show commits on the remote branch
    #[command(name = "history")]
    History {
        /// Number of commits to show (0 shows all)
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },

    /// Check that the remote branch is reachable with the configured token
    #[command(name = "health")]
    Health,

    /// Show or change configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

/// Where `put` takes its content from. Standard input when none is given.
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct PutSource {
    /// Copy content from a local file
    #[arg(long, value_name = "FILE")]
    pub from: Option<PathBuf>,

    /// Use this text as content
    #[arg(long, value_name = "TEXT")]
    pub content: Option<String>,

    /// Decode this base64 string as content
    #[arg(long, value_name = "B64")]
    pub base64: Option<String>,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective value of a key
    Get {
        /// Key such as 'remote.branch'
        key: String,
    },
    /// Set a key in the workspace config
    Set {
        /// Key such as 'remote.branch'
        key: String,
        /// New value
        value: String,
    },
    /// List effective configuration
    List,
}
