use crate::{error::SyncError, traversal::DEFAULT_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use toml::Table;

/// Token value shipped in `default.toml`; a run refuses to start while it is still set.
pub const PLACEHOLDER_TOKEN: &str = "NEED TO SPECIFY IN local.toml";

/// Environment variable that overrides `api_token`.
pub const TOKEN_ENV_VAR: &str = "OCL_API_TOKEN";

pub const DEFAULT_CONFIG_NAME: &str = "default.toml";
pub const LOCAL_CONFIG_NAME: &str = "local.toml";

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_reference_limit() -> usize {
    20000
}

fn default_commit() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base url of the OCL API, e.g. `https://api.openconceptlab.org`
    pub server: String,
    /// Server-relative path of the source whose concepts are traversed
    pub source_path: String,
    /// Server-relative path of the collection kept in sync
    pub collection_path: String,
    pub api_token: String,
    /// Newline-delimited file of seed concept ids
    pub concept_file: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// `limit` used when listing the collection's current references
    #[serde(default = "default_reference_limit")]
    pub reference_limit: usize,
    /// When false the run computes and logs its plan without writing to the collection
    #[serde(default = "default_commit")]
    pub commit: bool,
}

impl SyncConfig {
    /// Check everything that can be checked before touching the network.
    pub fn validate(&self) -> Result<(), SyncError> {
        let token = self.api_token.trim();
        if token.is_empty() || token == PLACEHOLDER_TOKEN {
            return Err(SyncError::Configuration(format!(
                "api_token is not set. Create a {LOCAL_CONFIG_NAME} containing api_token = \"your-token\" or set {TOKEN_ENV_VAR}"
            )));
        }
        if self.concurrency == 0 {
            return Err(SyncError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.server)?;
        for (name, path) in [
            ("source_path", &self.source_path),
            ("collection_path", &self.collection_path),
        ] {
            if !path.starts_with('/') || !path.ends_with('/') {
                return Err(SyncError::Configuration(format!(
                    "{name} must start and end with '/', got '{path}'"
                )));
            }
        }
        if !self.concept_file.is_file() {
            return Err(SyncError::Configuration(format!(
                "Cannot read file: {}",
                self.concept_file.display()
            )));
        }
        Ok(())
    }
}

/// Loads [`SyncConfig`] from a directory holding `default.toml` and an optional
/// `local.toml`, the latter overriding the former key by key.
///
/// The process environment is only consulted after [`with_env_token`](Self::with_env_token).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    dir: PathBuf,
    token_override: Option<String>,
}

impl TomlConfigProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        TomlConfigProvider {
            dir: dir.into(),
            token_override: None,
        }
    }

    /// Use `token` instead of the `api_token` from either file. Blank tokens are ignored.
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        self.token_override = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Take the token override from `OCL_API_TOKEN`, if set.
    pub fn with_env_token(self) -> Self {
        self.with_token_override(std::env::var(TOKEN_ENV_VAR).ok())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read, merge and deserialize the config. The token override wins over both files. A relative `concept_file` is taken relative to the parent of the config
    /// directory.
    pub fn load(&self) -> Result<SyncConfig, SyncError> {
        let default_path = self.dir.join(DEFAULT_CONFIG_NAME);
        let local_path = self.dir.join(LOCAL_CONFIG_NAME);

        let mut merged = Table::new();
        let mut found_any = false;
        for path in [&default_path, &local_path] {
            if !path.exists() {
                tracing::debug!("Config file {:?} not found, skipping", path);
                continue;
            }
            tracing::debug!("Reading config from {:?}", path);
            let table: Table = toml::from_str(&read_to_string(path)?)?;
            merge_tables(&mut merged, table);
            found_any = true;
        }
        if !found_any {
            return Err(SyncError::Configuration(format!(
                "no {DEFAULT_CONFIG_NAME} or {LOCAL_CONFIG_NAME} in {}",
                self.dir.display()
            )));
        }

        if let Some(token) = &self.token_override {
            merged.insert("api_token".to_string(), toml::Value::String(token.clone()));
        }

        let mut config: SyncConfig = toml::Value::Table(merged).try_into()?;
        if config.concept_file.is_relative() {
            let base = self.dir.parent().unwrap_or_else(|| Path::new("."));
            config.concept_file = base.join(&config.concept_file);
        }
        Ok(config)
    }
}

pub fn get_content<P: AsRef<Path>>(path: P) -> Result<String, SyncError> {
    tracing::debug!("Reading {:?}", path.as_ref());
    Ok(read_to_string(path)?)
}

/// Recursively overlay `overlay` onto `base`.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
