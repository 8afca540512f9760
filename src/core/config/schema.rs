//! core::config::schema
//!
//! Configuration schema types.
//!
//! The same schema is used for the global file and the workspace file; the
//! workspace file wins field by field.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., branch must be a valid branch name).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::paths::STATE_DIR_NAME;
use crate::core::types::BranchName;

/// A configuration file.
///
/// # Example
///
/// ```toml
/// [remote]
/// provider = "github"
/// repo = "octocat/site"
/// branch = "main"
/// timeout_secs = 30
///
/// [author]
/// name = "Site Bot"
/// email = "bot@example.com"
///
/// [staging]
/// dir = "public"
/// missing_files = "skip"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Remote object store settings
    pub remote: Option<RemoteSection>,

    /// Commit author identity
    pub author: Option<AuthorSection>,

    /// Local staging area settings
    pub staging: Option<StagingSection>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        if let Some(staging) = &self.staging {
            staging.validate()?;
        }
        Ok(())
    }
}

/// Remote object store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSection {
    /// Store implementation (e.g., "github")
    pub provider: Option<String>,

    /// Repository, as `owner/name` or a GitHub remote URL
    pub repo: Option<String>,

    /// Integration branch managed by stagepush
    pub branch: Option<String>,

    /// API base URL (configurable for GitHub Enterprise)
    pub api_base: Option<String>,

    /// Name of the environment variable holding the access token
    pub token_env: Option<String>,

    /// Deadline for one publish cycle, also used as the per-request timeout
    pub timeout_secs: Option<u64>,
}

impl RemoteSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            let valid = crate::store::valid_store_names();
            if !valid.contains(&provider.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid provider '{}', must be one of: {}",
                    provider,
                    valid.join(", ")
                )));
            }
        }

        if let Some(repo) = &self.repo {
            if crate::store::parse_repo_spec(repo).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid repo '{}', expected 'owner/name' or a GitHub URL",
                    repo
                )));
            }
        }

        if let Some(branch) = &self.branch {
            BranchName::new(branch).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid branch name: {}", e))
            })?;
        }

        if let Some(token_env) = &self.token_env {
            if token_env.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "token_env cannot be empty".to_string(),
                ));
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Commit author identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorSection {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Local staging area settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StagingSection {
    /// Staging directory relative to the workspace root
    pub dir: Option<String>,

    /// What to do when a dirty path no longer exists at publish time
    pub missing_files: Option<MissingFilePolicy>,
}

impl StagingSection {
    /// The staging dir must be a strict subdirectory of the workspace root
    /// that neither is nor lies inside the state directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.dir {
            let components: Vec<&str> = dir
                .split(['/', '\\'])
                .filter(|c| !c.is_empty() && *c != ".")
                .collect();
            let escapes = components.iter().any(|c| *c == "..");
            if dir.starts_with('/') || escapes || components.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid staging dir '{}', must be a subdirectory of the workspace",
                    dir
                )));
            }
            if components[0] == STATE_DIR_NAME {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid staging dir '{}', {} is reserved for stagepush state",
                    dir, STATE_DIR_NAME
                )));
            }
        }
        Ok(())
    }
}

/// Policy for dirty paths whose staged file no longer exists at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFilePolicy {
    /// Leave the path out of the commit and keep publishing the rest.
    #[default]
    Skip,
    /// Fail the whole cycle before anything is uploaded.
    Fail,
}

impl std::fmt::Display for MissingFilePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingFilePolicy::Skip => write!(f, "skip"),
            MissingFilePolicy::Fail => write!(f, "fail"),
        }
    }
}
