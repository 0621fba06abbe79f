use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notary_ledger::{LedgerConfig, LedgerError};
use notary_store::{StorageError, StoreConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::service::{RegistryOptions, RegistryService};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Everything needed to build a [`RegistryService`].
///
/// ```toml
/// precheck_duplicates = true
///
/// [store]
/// backend = "local"
/// api_url = "http://127.0.0.1:5001"
///
/// [ledger]
/// rpc_url = "http://127.0.0.1:8545"
/// chain_id = 11155111
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default = "default_precheck")]
    pub precheck_duplicates: bool,
}

impl RegistryConfig {
    /// Load every section from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let precheck_duplicates = match var("PRECHECK_DUPLICATES") {
            Some(raw) => parse_bool("PRECHECK_DUPLICATES", &raw)?,
            None => default_precheck(),
        };
        Ok(Self {
            store: StoreConfig::from_vars(&var)?,
            ledger: LedgerConfig::from_vars(&var)?,
            precheck_duplicates,
        })
    }

    /// Parse a TOML file. Environment variables still override it: the
    /// ledger and store variables (`PRIVATE_KEY`, `RPC_URL`,
    /// `PINATA_API_KEY`, ...) and `PRECHECK_DUPLICATES`. `STORAGE_BACKEND`
    /// does not switch the backend the file selects.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_vars(path, |name| std::env::var(name).ok())
    }

    pub fn from_file_with_vars<F>(path: impl AsRef<Path>, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(raw) = var("PRECHECK_DUPLICATES") {
            config.precheck_duplicates = parse_bool("PRECHECK_DUPLICATES", &raw)?;
        }
        config.store = config.store.overlay(&var)?;
        config.ledger = config.ledger.overlay(var)?;
        debug!(path = %path.display(), "loaded registry config");
        Ok(config)
    }

    /// `from_file` when a path is given, otherwise `from_env`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    pub fn options(&self) -> RegistryOptions {
        RegistryOptions {
            confirm_timeout: Duration::from_secs(self.ledger.confirm_timeout_secs),
            precheck_duplicates: self.precheck_duplicates,
        }
    }

    /// Build the configured store and JSON-RPC gateway.
    pub fn build(&self) -> Result<RegistryService, ConfigError> {
        let store = self.store.build()?;
        let ledger = Arc::new(self.ledger.connect()?);
        Ok(RegistryService::new(store, ledger).with_options(self.options()))
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!("{name} `{other}`"))),
    }
}

fn default_precheck() -> bool {
    true
}
