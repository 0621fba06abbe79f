use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use notary_crypto::SigningKey;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LedgerError, LedgerResult};
use crate::fees::{FeePolicy, Fees, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use crate::manifest::ContractManifest;
use crate::rpc::RpcLedgerGateway;

/// Sepolia's chain id, the network the registry was first deployed to.
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;

/// Connection and signing settings for the ledger.
///
/// Custom `Debug` implementation redacts the private key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Hex ed25519 seed of the submitting account. Never serialized.
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    pub chain_id: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    /// Ask the node for gas estimates instead of using the fixed values.
    pub fee_estimation: bool,
    pub confirm_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub contract_abi_path: PathBuf,
    pub contract_address_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            private_key: None,
            chain_id: DEFAULT_CHAIN_ID,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
            fee_estimation: false,
            confirm_timeout_secs: 120,
            poll_interval_ms: 1000,
            request_timeout_secs: 30,
            contract_abi_path: "contract_abi.json".into(),
            contract_address_path: "contract_address.txt".into(),
        }
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("chain_id", &self.chain_id)
            .field("gas_limit", &self.gas_limit)
            .field("gas_price", &self.gas_price)
            .field("fee_estimation", &self.fee_estimation)
            .field("confirm_timeout_secs", &self.confirm_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("contract_abi_path", &self.contract_abi_path)
            .field("contract_address_path", &self.contract_address_path)
            .finish()
    }
}

impl LedgerConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Variables: `RPC_URL`, `PRIVATE_KEY`, `CHAIN_ID`, `GAS_LIMIT`,
    /// `GAS_PRICE`, `FEE_ESTIMATION`, `CONFIRM_TIMEOUT_SECS`,
    /// `POLL_INTERVAL_MS`, `RPC_TIMEOUT_SECS`, `CONTRACT_ABI_PATH`,
    /// `CONTRACT_ADDRESS_PATH`.
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> LedgerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay(var)
    }

    /// Replace fields for which `var` has a value.
    pub fn overlay<F>(mut self, var: F) -> LedgerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("RPC_URL") {
            self.rpc_url = url;
        }
        if let Some(key) = var("PRIVATE_KEY") {
            self.private_key = Some(key);
        }
        parse_into(&var, "CHAIN_ID", &mut self.chain_id)?;
        parse_into(&var, "GAS_LIMIT", &mut self.gas_limit)?;
        parse_into(&var, "GAS_PRICE", &mut self.gas_price)?;
        parse_into(&var, "FEE_ESTIMATION", &mut self.fee_estimation)?;
        parse_into(&var, "CONFIRM_TIMEOUT_SECS", &mut self.confirm_timeout_secs)?;
        parse_into(&var, "POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        parse_into(&var, "RPC_TIMEOUT_SECS", &mut self.request_timeout_secs)?;
        if let Some(path) = var("CONTRACT_ABI_PATH") {
            self.contract_abi_path = path.into();
        }
        if let Some(path) = var("CONTRACT_ADDRESS_PATH") {
            self.contract_address_path = path.into();
        }
        Ok(self)
    }

    pub fn signing_key(&self) -> LedgerResult<SigningKey> {
        let key = self
            .private_key
            .as_deref()
            .ok_or_else(|| LedgerError::Config("PRIVATE_KEY is required".into()))?;
        SigningKey::from_hex(key).map_err(|e| LedgerError::Config(format!("PRIVATE_KEY: {e}")))
    }

    pub fn fee_policy(&self) -> FeePolicy {
        let fees = Fees {
            gas_limit: self.gas_limit,
            gas_price: self.gas_price,
        };
        if self.fee_estimation {
            FeePolicy::estimating(fees)
        } else {
            FeePolicy::fixed(fees)
        }
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn load_manifest(&self) -> LedgerResult<ContractManifest> {
        ContractManifest::load(&self.contract_abi_path, &self.contract_address_path)
    }

    /// Load the manifest and build a JSON-RPC gateway signing with the
    /// configured key.
    pub fn connect(&self) -> LedgerResult<RpcLedgerGateway> {
        let manifest = self.load_manifest()?;
        let endpoint = Url::parse(&self.rpc_url)
            .map_err(|e| LedgerError::Config(format!("invalid RPC_URL `{}`: {e}", self.rpc_url)))?;
        let gateway = RpcLedgerGateway::new(
            endpoint,
            self.chain_id,
            manifest.address,
            Arc::new(self.signing_key()?),
            Duration::from_secs(self.request_timeout_secs),
        )?;
        Ok(gateway
            .with_fees(self.fee_policy())
            .with_poll_interval(self.poll_interval()))
    }
}

fn parse_into<F, T>(var: &F, name: &str, slot: &mut T) -> LedgerResult<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = var(name) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| LedgerError::Config(format!("invalid {name} `{raw}`: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_crypto::Signer;
    use notary_types::Address;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_deployment_settings() {
        let cfg = LedgerConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(cfg.chain_id, 11_155_111);
        assert_eq!(cfg.gas_limit, 3_000_000);
        assert_eq!(cfg.gas_price, 1_000_000_000);
        assert!(!cfg.fee_estimation);
        assert_eq!(cfg.confirm_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.contract_abi_path, PathBuf::from("contract_abi.json"));
        assert_eq!(cfg.fee_policy(), FeePolicy::fixed(Fees::default()));
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = LedgerConfig::from_vars(vars(&[
            ("RPC_URL", "http://node:8545"),
            ("CHAIN_ID", "1337"),
            ("FEE_ESTIMATION", "true"),
            ("POLL_INTERVAL_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.rpc_url, "http://node:8545");
        assert_eq!(cfg.chain_id, 1337);
        assert!(cfg.fee_policy().estimate);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn malformed_number_is_a_config_error() {
        let err = LedgerConfig::from_vars(vars(&[("GAS_LIMIT", "lots")])).unwrap_err();
        assert!(matches!(err, LedgerError::Config(ref m) if m.contains("GAS_LIMIT")));
    }

    #[test]
    fn signing_key_requires_private_key() {
        let cfg = LedgerConfig::default();
        assert!(matches!(cfg.signing_key(), Err(LedgerError::Config(_))));

        let seed = hex::encode([7u8; 32]);
        let cfg = LedgerConfig::from_vars(vars(&[("PRIVATE_KEY", &seed)])).unwrap();
        let key = cfg.signing_key().unwrap();
        assert_eq!(key.address(), SigningKey::from_bytes([7; 32]).address());
    }

    #[test]
    fn debug_redacts_private_key() {
        let seed = hex::encode([7u8; 32]);
        let cfg = LedgerConfig::from_vars(vars(&[("PRIVATE_KEY", &seed)])).unwrap();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains(&seed));
        assert!(shown.contains("REDACTED"));
    }

    #[test]
    fn serializing_omits_private_key() {
        let seed = hex::encode([7u8; 32]);
        let cfg = LedgerConfig::from_vars(vars(&[("PRIVATE_KEY", &seed)])).unwrap();

        let json = serde_json::to_value(&cfg).unwrap();
        assert!(json.get("private_key").is_none());
        assert_eq!(json["chain_id"], 11_155_111);

        let rendered = toml::to_string(&cfg).unwrap();
        assert!(!rendered.contains(&seed));
        let back: LedgerConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(back.private_key, None);
    }

    #[test]
    fn parses_from_toml_with_defaults() {
        let cfg: LedgerConfig = toml::from_str(
            r#"
            rpc_url = "http://node:8545"
            chain_id = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.chain_id, 5);
        assert_eq!(cfg.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(cfg.confirm_timeout_secs, 120);
    }

    #[test]
    fn connect_loads_manifest_address() {
        let dir = TempDir::new().unwrap();
        let abi = dir.path().join("abi.json");
        let addr = dir.path().join("addr.txt");
        let contract = Address::from_bytes([0xC0; 20]);
        ContractManifest::registry(contract).save(&abi, &addr).unwrap();

        let cfg = LedgerConfig {
            private_key: Some(hex::encode([7u8; 32])),
            contract_abi_path: abi,
            contract_address_path: addr,
            ..LedgerConfig::default()
        };
        let gateway = cfg.connect().unwrap();
        assert_eq!(gateway.contract_address(), contract);
    }

    #[test]
    fn connect_without_manifest_fails() {
        let dir = TempDir::new().unwrap();
        let cfg = LedgerConfig {
            private_key: Some(hex::encode([7u8; 32])),
            contract_abi_path: dir.path().join("missing.json"),
            contract_address_path: dir.path().join("missing.txt"),
            ..LedgerConfig::default()
        };
        assert!(matches!(cfg.connect(), Err(LedgerError::Manifest(_))));
    }
}
