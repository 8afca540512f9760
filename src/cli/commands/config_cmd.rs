//! config command - Get, set, or list configuration values

use anyhow::{bail, Context as _, Result};

use super::Workspace;
use crate::cli::Context;
use crate::core::config::{
    AuthorSection, Config, ConfigFile, MissingFilePolicy, RemoteSection, StagingSection,
};
use crate::ui::output;

/// Keys understood by `get` and `set`.
const KEYS: &[&str] = &[
    "remote.provider",
    "remote.repo",
    "remote.branch",
    "remote.api_base",
    "remote.token_env",
    "remote.timeout_secs",
    "author.name",
    "author.email",
    "staging.dir",
    "staging.missing_files",
];

/// Get a configuration value.
pub fn get(ctx: &Context, key: &str) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    if let Some(value) = effective(&workspace.config, key)? {
        output::data(value);
    }
    Ok(())
}

/// Set a configuration value in the workspace config.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let mut file = workspace.config.workspace.clone().unwrap_or_default();
    apply(&mut file, key, value)?;

    let path = Config::write_workspace(&workspace.root, &file).context("Failed to write config")?;
    output::success(
        format!("Set {} = {} in {}", key, value, path.display()),
        ctx.verbosity(),
    );
    Ok(())
}

/// List all effective configuration values.
pub fn list(ctx: &Context) -> Result<()> {
    let workspace = Workspace::open(ctx)?;
    let config = &workspace.config;

    output::data("# Effective configuration");
    for key in KEYS {
        let value = effective(config, key)?.unwrap_or_else(|| "(not set)".to_string());
        output::data(format!("{} = {}", key, value));
    }
    output::data(format!(
        "token = {}",
        if config.token().is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    ));

    output::data("\n# Files");
    let describe = |path: Option<&std::path::Path>| {
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };
    output::data(format!("global = {}", describe(config.global_config_path())));
    output::data(format!(
        "workspace = {}",
        describe(config.workspace_config_path())
    ));
    output::data(format!(
        "staging = {}",
        workspace.paths.staging_dir().display()
    ));
    Ok(())
}

/// The value of `key` after all precedence rules.
fn effective(config: &Config, key: &str) -> Result<Option<String>> {
    let value = match key {
        "remote.provider" => Some(config.provider().to_string()),
        "remote.repo" => config.repo().map(str::to_string),
        "remote.branch" => Some(config.branch()?.to_string()),
        "remote.api_base" => Some(config.api_base().to_string()),
        "remote.token_env" => Some(config.token_env().to_string()),
        "remote.timeout_secs" => Some(config.timeout().as_secs().to_string()),
        "author.name" => config.author().map(|a| a.name),
        "author.email" => config.author().map(|a| a.email),
        "staging.dir" => Some(config.staging_dir().to_string()),
        "staging.missing_files" => Some(config.missing_files().to_string()),
        _ => bail!("Unknown configuration key: {}", key),
    };
    Ok(value)
}

/// Set `key` in a config file. Validation happens on write.
fn apply(file: &mut ConfigFile, key: &str, value: &str) -> Result<()> {
    let value = value.to_string();
    match key.split_once('.') {
        Some(("remote", field)) => {
            let remote = file.remote.get_or_insert_with(RemoteSection::default);
            match field {
                "provider" => remote.provider = Some(value),
                "repo" => remote.repo = Some(value),
                "branch" => remote.branch = Some(value),
                "api_base" => remote.api_base = Some(value),
                "token_env" => remote.token_env = Some(value),
                "timeout_secs" => {
                    let secs = value
                        .parse()
                        .with_context(|| format!("Invalid timeout '{}'", value))?;
                    remote.timeout_secs = Some(secs);
                }
                _ => bail!("Unknown configuration key: {}", key),
            }
        }
        Some(("author", field)) => {
            let author = file.author.get_or_insert_with(AuthorSection::default);
            match field {
                "name" => author.name = Some(value),
                "email" => author.email = Some(value),
                _ => bail!("Unknown configuration key: {}", key),
            }
        }
        Some(("staging", field)) => {
            let staging = file.staging.get_or_insert_with(StagingSection::default);
            match field {
                "dir" => staging.dir = Some(value),
                "missing_files" => {
                    staging.missing_files = Some(match value.as_str() {
                        "skip" => MissingFilePolicy::Skip,
                        "fail" => MissingFilePolicy::Fail,
                        _ => bail!("Invalid missing_files '{}', expected 'skip' or 'fail'", value),
                    });
                }
                _ => bail!("Unknown configuration key: {}", key),
            }
        }
        _ => bail!("Unknown configuration key: {}", key),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_sets_nested_fields() {
        let mut file = ConfigFile::default();
        apply(&mut file, "remote.branch", "gh-pages").unwrap();
        apply(&mut file, "remote.timeout_secs", "5").unwrap();
        apply(&mut file, "staging.missing_files", "fail").unwrap();

        let remote = file.remote.unwrap();
        assert_eq!(remote.branch.as_deref(), Some("gh-pages"));
        assert_eq!(remote.timeout_secs, Some(5));
        assert_eq!(
            file.staging.unwrap().missing_files,
            Some(MissingFilePolicy::Fail)
        );
    }

    #[test]
    fn apply_rejects_unknown_keys_and_values() {
        let mut file = ConfigFile::default();
        assert!(apply(&mut file, "remote.nope", "x").is_err());
        assert!(apply(&mut file, "trunk", "x").is_err());
        assert!(apply(&mut file, "remote.timeout_secs", "soon").is_err());
        assert!(apply(&mut file, "staging.missing_files", "ignore").is_err());
    }

    #[test]
    fn every_key_is_readable() {
        let config = Config::default();
        for key in KEYS {
            assert!(effective(&config, key).is_ok(), "{}", key);
        }
        assert!(effective(&config, "nope").is_err());
    }
}
