//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! stagepush has two configuration files sharing one schema:
//! - **Global**: User-level settings (author identity, API defaults)
//! - **Workspace**: Per-site settings (repository, branch, staging dir)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Workspace config file
//! 4. Environment (`GITHUB_REPO`, `GITHUB_USER`, `GITHUB_EMAIL`)
//! 5. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `--config <path>` when given
//! 2. `$STAGEPUSH_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/stagepush/config.toml`
//! 4. `~/.stagepush/config.toml`
//!
//! # Secrets
//!
//! The access token is never read from a file. `remote.token_env` names the
//! environment variable that holds it (default `GITHUB_TOKEN`).
//!
//! # Example
//!
//! ```no_run
//! use stagepush::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Path::new("/path/to/site"), None).unwrap();
//! let config = result.config;
//!
//! println!("Branch: {}", config.branch().unwrap());
//! println!("Staging: {}", config.staging_dir());
//! ```

pub mod schema;

pub use schema::{AuthorSection, ConfigFile, MissingFilePolicy, RemoteSection, StagingSection};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::StagePaths;
use crate::core::types::BranchName;
use crate::store::Signature;

/// Default store provider.
pub const DEFAULT_PROVIDER: &str = "github";
/// Default integration branch.
pub const DEFAULT_BRANCH: &str = "main";
/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
/// Default token variable.
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";
/// Default cycle deadline, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default staging directory.
pub const DEFAULT_STAGING_DIR: &str = "public";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The file whose value was affected.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Values taken from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `GITHUB_REPO`
    pub repo: Option<String>,
    /// `GITHUB_USER`
    pub user: Option<String>,
    /// `GITHUB_EMAIL`
    pub email: Option<String>,
    /// Content of the variable named by `remote.token_env`
    pub token: Option<String>,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules automatically.
#[derive(Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: ConfigFile,
    /// Workspace configuration (if present)
    pub workspace: Option<ConfigFile>,
    env: EnvOverrides,
    global_path: Option<PathBuf>,
    workspace_path: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("global", &self.global)
            .field("workspace", &self.workspace)
            .field("global_path", &self.global_path)
            .field("workspace_path", &self.workspace_path)
            .field("token", &self.env.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Load configuration for the workspace at `root`.
    ///
    /// `explicit` replaces the global config search with a single file,
    /// which must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or
    /// contain invalid values. Missing files are not an error.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_with(root, explicit, |name| std::env::var(name).ok())
    }

    /// Load configuration with a custom environment lookup.
    pub fn load_with<F>(
        root: &Path,
        explicit: Option<&Path>,
        env: F,
    ) -> Result<ConfigLoadResult, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        let global_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::ReadError {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "config file does not exist",
                        ),
                    });
                }
                Some(path.to_path_buf())
            }
            None => Self::find_global(&env),
        };

        let global = match &global_path {
            Some(path) => Self::read_config_file(path)?,
            None => ConfigFile::default(),
        };

        let workspace_file = StagePaths::config_path_for(root);
        let (workspace, workspace_path) = if workspace_file.exists() {
            let file = Self::read_config_file(&workspace_file)?;
            (Some(file), Some(workspace_file))
        } else {
            (None, None)
        };

        global.validate()?;
        if let Some(ref w) = workspace {
            w.validate()?;
        }

        let mut config = Config {
            global,
            workspace,
            env: EnvOverrides::default(),
            global_path,
            workspace_path,
        };

        let repo = env("GITHUB_REPO").filter(|v| !v.is_empty());
        if let Some(repo) = &repo {
            if crate::store::parse_repo_spec(repo).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid GITHUB_REPO '{}', expected 'owner/name'",
                    repo
                )));
            }
            if let (Some(file_repo), Some(path)) = (config.file_repo(), config.repo_source()) {
                if file_repo != repo.as_str() {
                    warnings.push(ConfigWarning {
                        message: format!(
                            "GITHUB_REPO overrides repo '{}' from the config file",
                            file_repo
                        ),
                        path,
                    });
                }
            }
        }

        config.env = EnvOverrides {
            repo,
            user: env("GITHUB_USER").filter(|v| !v.is_empty()),
            email: env("GITHUB_EMAIL").filter(|v| !v.is_empty()),
            token: env(config.token_env()).filter(|v| !v.is_empty()),
        };

        Ok(ConfigLoadResult { config, warnings })
    }

    fn find_global<F>(env: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env("STAGEPUSH_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("stagepush/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".stagepush/config.toml");
        path.exists().then_some(path)
    }

    fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write a workspace config file atomically.
    ///
    /// Returns the path written.
    pub fn write_workspace(root: &Path, file: &ConfigFile) -> Result<PathBuf, ConfigError> {
        file.validate()?;
        let path = StagePaths::config_path_for(root);
        write_config_atomic(&path, file)?;
        Ok(path)
    }

    /// Path to the loaded global config file, if any.
    pub fn global_config_path(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Path to the loaded workspace config file, if any.
    pub fn workspace_config_path(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }

    fn remote_field<'a, T>(&'a self, get: impl Fn(&'a RemoteSection) -> Option<T>) -> Option<T> {
        self.workspace
            .as_ref()
            .and_then(|w| w.remote.as_ref())
            .and_then(&get)
            .or_else(|| self.global.remote.as_ref().and_then(&get))
    }

    fn staging_field<'a, T>(&'a self, get: impl Fn(&'a StagingSection) -> Option<T>) -> Option<T> {
        self.workspace
            .as_ref()
            .and_then(|w| w.staging.as_ref())
            .and_then(&get)
            .or_else(|| self.global.staging.as_ref().and_then(&get))
    }

    fn author_field<'a, T>(&'a self, get: impl Fn(&'a AuthorSection) -> Option<T>) -> Option<T> {
        self.workspace
            .as_ref()
            .and_then(|w| w.author.as_ref())
            .and_then(&get)
            .or_else(|| self.global.author.as_ref().and_then(&get))
    }

    fn file_repo(&self) -> Option<&str> {
        self.remote_field(|r| r.repo.as_deref())
    }

    fn repo_source(&self) -> Option<PathBuf> {
        let in_workspace = self
            .workspace
            .as_ref()
            .and_then(|w| w.remote.as_ref())
            .and_then(|r| r.repo.as_ref())
            .is_some();
        if in_workspace {
            self.workspace_path.clone()
        } else {
            self.global_path.clone()
        }
    }

    /// Store provider name.
    pub fn provider(&self) -> &str {
        self.remote_field(|r| r.provider.as_deref())
            .unwrap_or(DEFAULT_PROVIDER)
    }

    /// Repository (`owner/name` or URL), if configured anywhere.
    pub fn repo(&self) -> Option<&str> {
        self.env.repo.as_deref().or_else(|| self.file_repo())
    }

    /// Integration branch.
    pub fn branch(&self) -> Result<BranchName, ConfigError> {
        let name = self
            .remote_field(|r| r.branch.as_deref())
            .unwrap_or(DEFAULT_BRANCH);
        BranchName::new(name)
            .map_err(|e| ConfigError::InvalidValue(format!("invalid branch name: {}", e)))
    }

    /// API base URL, without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.remote_field(|r| r.api_base.as_deref())
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    /// Name of the environment variable holding the token.
    pub fn token_env(&self) -> &str {
        self.remote_field(|r| r.token_env.as_deref())
            .unwrap_or(DEFAULT_TOKEN_ENV)
    }

    /// Access token read from the environment at load time.
    pub fn token(&self) -> Option<&str> {
        self.env.token.as_deref()
    }

    /// Per-cycle deadline and per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.remote_field(|r| r.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Commit author, when both name and email are known.
    ///
    /// Without an author the store attributes commits to the token owner.
    pub fn author(&self) -> Option<Signature> {
        let name = self
            .env
            .user
            .clone()
            .or_else(|| self.author_field(|a| a.name.clone()))?;
        let email = self
            .env
            .email
            .clone()
            .or_else(|| self.author_field(|a| a.email.clone()))?;
        Some(Signature { name, email })
    }

    /// Staging directory relative to the workspace root.
    pub fn staging_dir(&self) -> &str {
        self.staging_field(|s| s.dir.as_deref())
            .unwrap_or(DEFAULT_STAGING_DIR)
    }

    /// Policy for dirty paths that vanished before publish.
    pub fn missing_files(&self) -> MissingFilePolicy {
        self.staging_field(|s| s.missing_files).unwrap_or_default()
    }

    /// Workspace paths derived from this configuration.
    pub fn paths(&self, root: PathBuf) -> StagePaths {
        StagePaths::new(root, self.staging_dir())
    }
}

/// Write a config file atomically.
///
/// Uses write-to-temp-then-rename so a crash never leaves a partial file.
fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents.as_bytes())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    file.sync_all().map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Load with an explicit (possibly empty) global file so the user's
    /// real home config never leaks into tests.
    fn load(
        root: &Path,
        global: &str,
        env: &[(&str, &str)],
    ) -> Result<ConfigLoadResult, ConfigError> {
        let global_path = root.join("global.toml");
        write(&global_path, global);
        Config::load_with(root, Some(&global_path), env_of(env))
    }

    mod defaults {
        use super::*;

        #[test]
        fn empty_files_use_defaults() {
            let temp = TempDir::new().unwrap();
            let config = load(temp.path(), "", &[]).unwrap().config;

            assert_eq!(config.provider(), "github");
            assert_eq!(config.repo(), None);
            assert_eq!(config.branch().unwrap().as_str(), "main");
            assert_eq!(config.api_base(), DEFAULT_API_BASE);
            assert_eq!(config.token_env(), "GITHUB_TOKEN");
            assert_eq!(config.token(), None);
            assert_eq!(config.timeout(), Duration::from_secs(30));
            assert_eq!(config.author(), None);
            assert_eq!(config.staging_dir(), "public");
            assert_eq!(config.missing_files(), MissingFilePolicy::Skip);
            assert!(config.workspace_config_path().is_none());
        }

        #[test]
        fn explicit_missing_file_is_error() {
            let temp = TempDir::new().unwrap();
            let missing = temp.path().join("missing.toml");
            let result = Config::load_with(temp.path(), Some(&missing), env_of(&[]));
            assert!(matches!(result, Err(ConfigError::ReadError { .. })));
        }
    }

    mod precedence {
        use super::*;

        #[test]
        fn workspace_overrides_global() {
            let temp = TempDir::new().unwrap();
            write(
                &StagePaths::config_path_for(temp.path()),
                "[remote]\nbranch = \"site\"\n[staging]\ndir = \"out\"\n",
            );
            let global = "[remote]\nrepo = \"octocat/site\"\nbranch = \"main\"\ntimeout_secs = 5\n";

            let config = load(temp.path(), global, &[]).unwrap().config;
            assert_eq!(config.branch().unwrap().as_str(), "site");
            assert_eq!(config.repo(), Some("octocat/site"));
            assert_eq!(config.timeout(), Duration::from_secs(5));
            assert_eq!(config.staging_dir(), "out");
            assert!(config.workspace_config_path().is_some());
        }

        #[test]
        fn env_overrides_files_with_warning() {
            let temp = TempDir::new().unwrap();
            write(
                &StagePaths::config_path_for(temp.path()),
                "[remote]\nrepo = \"octocat/site\"\n",
            );

            let result = load(temp.path(), "", &[("GITHUB_REPO", "other/repo")]).unwrap();
            assert_eq!(result.config.repo(), Some("other/repo"));
            assert_eq!(result.warnings.len(), 1);
            assert!(result.warnings[0].message.contains("octocat/site"));
        }

        #[test]
        fn author_from_env_and_file() {
            let temp = TempDir::new().unwrap();
            let global = "[author]\nname = \"File Name\"\nemail = \"file@example.com\"\n";

            let config = load(temp.path(), global, &[("GITHUB_USER", "Env Name")])
                .unwrap()
                .config;
            assert_eq!(
                config.author(),
                Some(Signature {
                    name: "Env Name".to_string(),
                    email: "file@example.com".to_string(),
                })
            );
        }

        #[test]
        fn token_read_from_named_variable() {
            let temp = TempDir::new().unwrap();
            let global = "[remote]\ntoken_env = \"SITE_TOKEN\"\n";

            let config = load(
                temp.path(),
                global,
                &[("GITHUB_TOKEN", "wrong"), ("SITE_TOKEN", "right")],
            )
            .unwrap()
            .config;
            assert_eq!(config.token(), Some("right"));
            assert!(!format!("{:?}", config).contains("right"));
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn parse_error_names_file() {
            let temp = TempDir::new().unwrap();
            let result = load(temp.path(), "[remote\n", &[]);
            assert!(matches!(result, Err(ConfigError::ParseError { .. })));
        }

        #[test]
        fn invalid_value_rejected() {
            let temp = TempDir::new().unwrap();
            let result = load(temp.path(), "[remote]\nbranch = \"bad..name\"\n", &[]);
            assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
        }

        #[test]
        fn invalid_env_repo_rejected() {
            let temp = TempDir::new().unwrap();
            let result = load(temp.path(), "", &[("GITHUB_REPO", "nope")]);
            assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
        }
    }

    mod write {
        use super::*;

        #[test]
        fn write_workspace_roundtrips() {
            let temp = TempDir::new().unwrap();
            let file = ConfigFile {
                remote: Some(RemoteSection {
                    repo: Some("octocat/site".to_string()),
                    branch: Some("gh-pages".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let path = Config::write_workspace(temp.path(), &file).unwrap();
            assert_eq!(path, StagePaths::config_path_for(temp.path()));
            assert!(!path.with_extension("toml.tmp").exists());

            let config = load(temp.path(), "", &[]).unwrap().config;
            assert_eq!(config.branch().unwrap().as_str(), "gh-pages");
        }

        #[test]
        fn write_workspace_validates() {
            let temp = TempDir::new().unwrap();
            let file = ConfigFile {
                remote: Some(RemoteSection {
                    timeout_secs: Some(0),
                    ..Default::default()
                }),
                ..Default::default()
            };
            assert!(Config::write_workspace(temp.path(), &file).is_err());
        }
    }
}
