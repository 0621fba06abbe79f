use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::daemon::LocalDaemonStore;
use crate::error::{StorageError, StoreResult};
use crate::memory::InMemoryBlobStore;
use crate::pinning::PinningServiceStore;
use crate::traits::BlobStore;

const DEFAULT_PINNING_API: &str = "https://api.pinata.cloud";
const DEFAULT_PINNING_GATEWAY: &str = "https://gateway.pinata.cloud";
const DEFAULT_DAEMON_API: &str = "http://127.0.0.1:5001";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Key/secret pair for the pinning service.
///
/// Custom `Debug` implementation redacts the secret.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PinningCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for PinningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinningCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Which blob store backend to use, and how to reach it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Remote pinning service.
    Pinata {
        /// May be left out of a config file and supplied through
        /// `PINATA_API_KEY`/`PINATA_API_SECRET`.
        #[serde(default)]
        credentials: PinningCredentials,
        #[serde(default = "default_pinning_api")]
        api_url: String,
        #[serde(default = "default_pinning_gateway")]
        gateway_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// IPFS daemon on this machine.
    Local {
        #[serde(default = "default_daemon_api")]
        api_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Process-local store, for tests and demos.
    Memory,
}

impl StoreConfig {
    /// Load from environment variables.
    ///
    /// Variables:
    /// - `STORAGE_BACKEND` -- `pinata` (default), `local`, or `memory`
    /// - `PINATA_API_KEY`, `PINATA_API_SECRET` (required for `pinata`)
    /// - `PINATA_API_URL` (default: `https://api.pinata.cloud`)
    /// - `PINATA_GATEWAY_URL` (default: `https://gateway.pinata.cloud`)
    /// - `IPFS_API_URL` (default: `http://127.0.0.1:5001`)
    /// - `STORAGE_TIMEOUT_SECS` (default: 60)
    pub fn from_env() -> StoreResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `var`.
    pub fn from_vars<F>(var: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = var("STORAGE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let backend = var("STORAGE_BACKEND").unwrap_or_else(|| "pinata".into());

        match backend.trim().to_ascii_lowercase().as_str() {
            "pinata" | "pinning" => {
                let api_key = var("PINATA_API_KEY")
                    .ok_or_else(|| StorageError::Config("PINATA_API_KEY is required".into()))?;
                let api_secret = var("PINATA_API_SECRET")
                    .ok_or_else(|| StorageError::Config("PINATA_API_SECRET is required".into()))?;
                Ok(Self::Pinata {
                    credentials: PinningCredentials {
                        api_key,
                        api_secret,
                    },
                    api_url: var("PINATA_API_URL").unwrap_or_else(default_pinning_api),
                    gateway_url: var("PINATA_GATEWAY_URL").unwrap_or_else(default_pinning_gateway),
                    timeout_secs,
                })
            }
            "local" | "ipfs" => Ok(Self::Local {
                api_url: var("IPFS_API_URL").unwrap_or_else(default_daemon_api),
                timeout_secs,
            }),
            "memory" => Ok(Self::Memory),
            other => Err(StorageError::Config(format!(
                "unknown storage backend `{other}` (expected pinata, local or memory)"
            ))),
        }
    }

    /// Replace settings of the selected backend for which `var` has a
    /// value. The backend itself is not switched.
    pub fn overlay<F>(mut self, var: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = match var("STORAGE_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                StorageError::Config(format!("STORAGE_TIMEOUT_SECS `{raw}`: {e}"))
            })?),
            None => None,
        };
        match &mut self {
            Self::Pinata {
                credentials,
                api_url,
                gateway_url,
                timeout_secs,
            } => {
                if let Some(key) = var("PINATA_API_KEY") {
                    credentials.api_key = key;
                }
                if let Some(secret) = var("PINATA_API_SECRET") {
                    credentials.api_secret = secret;
                }
                if let Some(url) = var("PINATA_API_URL") {
                    *api_url = url;
                }
                if let Some(url) = var("PINATA_GATEWAY_URL") {
                    *gateway_url = url;
                }
                if let Some(secs) = timeout {
                    *timeout_secs = secs;
                }
            }
            Self::Local {
                api_url,
                timeout_secs,
            } => {
                if let Some(url) = var("IPFS_API_URL") {
                    *api_url = url;
                }
                if let Some(secs) = timeout {
                    *timeout_secs = secs;
                }
            }
            Self::Memory => {}
        }
        Ok(self)
    }

    /// Construct the configured backend.
    pub fn build(&self) -> StoreResult<Arc<dyn BlobStore>> {
        match self {
            Self::Pinata {
                credentials,
                api_url,
                gateway_url,
                timeout_secs,
            } => {
                if credentials.api_key.is_empty() || credentials.api_secret.is_empty() {
                    return Err(StorageError::Config(
                        "pinata backend needs PINATA_API_KEY and PINATA_API_SECRET".into(),
                    ));
                }
                Ok(Arc::new(PinningServiceStore::new(
                    parse_url("api_url", api_url)?,
                    parse_url("gateway_url", gateway_url)?,
                    credentials.clone(),
                    Duration::from_secs(*timeout_secs),
                )?))
            }
            Self::Local {
                api_url,
                timeout_secs,
            } => Ok(Arc::new(LocalDaemonStore::new(
                parse_url("api_url", api_url)?,
                Duration::from_secs(*timeout_secs),
            )?)),
            Self::Memory => Ok(Arc::new(InMemoryBlobStore::new())),
        }
    }
}

fn parse_url(field: &str, raw: &str) -> StoreResult<Url> {
    Url::parse(raw).map_err(|e| StorageError::Config(format!("invalid {field} `{raw}`: {e}")))
}

fn default_pinning_api() -> String {
    DEFAULT_PINNING_API.into()
}

fn default_pinning_gateway() -> String {
    DEFAULT_PINNING_GATEWAY.into()
}

fn default_daemon_api() -> String {
    DEFAULT_DAEMON_API.into()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
