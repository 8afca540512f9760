//! store::factory
//!
//! Store selection and creation.
//!
//! Commands use [`create_store`] instead of constructing a specific store,
//! so the engine only ever sees `dyn ObjectStore`.

use thiserror::Error;

use super::github::{parse_repo_spec, GitHubStore};
use super::traits::{ObjectStore, StoreError};
use crate::core::config::Config;

/// Supported store providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreProvider {
    /// GitHub git data API
    GitHub,
}

impl StoreProvider {
    /// Get all available providers.
    pub fn all() -> &'static [StoreProvider] {
        &[StoreProvider::GitHub]
    }

    /// The provider name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            StoreProvider::GitHub => "github",
        }
    }

    /// Parse a provider from a string.
    ///
    /// ```
    /// use stagepush::store::StoreProvider;
    ///
    /// assert_eq!(StoreProvider::parse("GitHub"), Some(StoreProvider::GitHub));
    /// assert_eq!(StoreProvider::parse("gitea"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(StoreProvider::GitHub),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Names accepted by `remote.provider`.
pub fn valid_store_names() -> &'static [&'static str] {
    &["github"]
}

/// Errors from creating a store.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("no repository configured (set remote.repo or GITHUB_REPO)")]
    NoRepo,

    #[error("invalid repository '{0}', expected 'owner/name' or a GitHub URL")]
    InvalidRepo(String),

    #[error("unknown store provider '{0}'")]
    UnknownProvider(String),

    #[error("no access token found (set ${0})")]
    NoToken(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create the object store described by `config`.
pub fn create_store(config: &Config) -> Result<Box<dyn ObjectStore>, FactoryError> {
    let provider = StoreProvider::parse(config.provider())
        .ok_or_else(|| FactoryError::UnknownProvider(config.provider().to_string()))?;

    let spec = config.repo().ok_or(FactoryError::NoRepo)?;
    let (owner, repo) =
        parse_repo_spec(spec).ok_or_else(|| FactoryError::InvalidRepo(spec.to_string()))?;

    let token = config
        .token()
        .ok_or_else(|| FactoryError::NoToken(config.token_env().to_string()))?;

    match provider {
        StoreProvider::GitHub => Ok(Box::new(GitHubStore::with_api_base(
            Some(token.to_string()),
            owner,
            repo,
            config.api_base(),
            config.timeout(),
        )?)),
    }
}
