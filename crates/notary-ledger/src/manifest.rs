use std::fs;
use std::path::Path;

use notary_codec::contract::{abi_json, REQUIRED_FUNCTIONS};
use notary_types::Address;
use serde_json::Value;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};

/// Deployed registry contract: its address and JSON ABI.
///
/// Persisted as two files, the ABI as JSON and the address as a single line
/// of `0x`-hex.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractManifest {
    pub address: Address,
    pub abi: Value,
}

impl ContractManifest {
    /// Manifest for the registry ABI this crate encodes against.
    pub fn registry(address: Address) -> Self {
        Self {
            address,
            abi: abi_json(),
        }
    }

    /// Read and validate a manifest from disk.
    pub fn load(abi_path: impl AsRef<Path>, address_path: impl AsRef<Path>) -> LedgerResult<Self> {
        let abi_path = abi_path.as_ref();
        let address_path = address_path.as_ref();

        let abi_text = fs::read_to_string(abi_path)
            .map_err(|e| LedgerError::Manifest(format!("{}: {e}", abi_path.display())))?;
        let abi: Value = serde_json::from_str(&abi_text)
            .map_err(|e| LedgerError::Manifest(format!("{}: {e}", abi_path.display())))?;

        let address_text = fs::read_to_string(address_path)
            .map_err(|e| LedgerError::Manifest(format!("{}: {e}", address_path.display())))?;
        let address = Address::from_hex(address_text.trim())
            .map_err(|e| LedgerError::Manifest(format!("{}: {e}", address_path.display())))?;

        let manifest = Self { address, abi };
        manifest.validate()?;
        debug!(address = %manifest.address, "loaded contract manifest");
        Ok(manifest)
    }

    /// Write the ABI and address files.
    pub fn save(&self, abi_path: impl AsRef<Path>, address_path: impl AsRef<Path>) -> LedgerResult<()> {
        let abi_path = abi_path.as_ref();
        let address_path = address_path.as_ref();
        let abi_text = serde_json::to_string_pretty(&self.abi)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        fs::write(abi_path, abi_text)
            .map_err(|e| LedgerError::Manifest(format!("{}: {e}", abi_path.display())))?;
        fs::write(address_path, format!("{}\n", self.address.to_hex()))
            .map_err(|e| LedgerError::Manifest(format!("{}: {e}", address_path.display())))?;
        Ok(())
    }

    /// Names of the `function` entries in the ABI.
    pub fn function_names(&self) -> Vec<&str> {
        self.abi
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.get("type").and_then(Value::as_str) == Some("function"))
                    .filter_map(|e| e.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The address must be non-zero and the ABI must declare every function
    /// the registry calls.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.address.is_zero() {
            return Err(LedgerError::Manifest("contract address is zero".into()));
        }
        if !self.abi.is_array() {
            return Err(LedgerError::Manifest("ABI must be a JSON array".into()));
        }
        let declared = self.function_names();
        let missing: Vec<&str> = REQUIRED_FUNCTIONS
            .iter()
            .copied()
            .filter(|name| !declared.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::Manifest(format!(
                "ABI is missing functions: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn contract() -> Address {
        Address::from_bytes([0xC0; 20])
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let abi = dir.path().join("contract_abi.json");
        let addr = dir.path().join("contract_address.txt");

        let manifest = ContractManifest::registry(contract());
        manifest.save(&abi, &addr).unwrap();

        let text = fs::read_to_string(&addr).unwrap();
        assert_eq!(text.trim(), contract().to_hex());
        assert_eq!(ContractManifest::load(&abi, &addr).unwrap(), manifest);
    }

    #[test]
    fn registry_abi_declares_required_functions() {
        let manifest = ContractManifest::registry(contract());
        for name in REQUIRED_FUNCTIONS {
            assert!(manifest.function_names().contains(&name), "{name}");
        }
        manifest.validate().unwrap();
    }

    #[test]
    fn missing_function_is_rejected() {
        let manifest = ContractManifest {
            address: contract(),
            abi: json!([
                { "type": "function", "name": "addDocument" },
                { "type": "function", "name": "getLatest" },
                { "type": "event", "name": "lookupByHash" }
            ]),
        };
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, LedgerError::Manifest(ref m) if m.contains("addVersion") && m.contains("lookupByHash")));
    }

    #[test]
    fn zero_address_is_rejected() {
        let err = ContractManifest::registry(Address::zero()).validate().unwrap_err();
        assert!(matches!(err, LedgerError::Manifest(_)));
    }

    #[test]
    fn missing_files_name_the_path() {
        let dir = TempDir::new().unwrap();
        let err = ContractManifest::load(dir.path().join("nope.json"), dir.path().join("addr.txt"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Manifest(ref m) if m.contains("nope.json")));
    }

    #[test]
    fn malformed_address_is_rejected() {
        let dir = TempDir::new().unwrap();
        let abi = dir.path().join("abi.json");
        let addr = dir.path().join("addr.txt");
        fs::write(&abi, abi_json().to_string()).unwrap();
        fs::write(&addr, "0x1234\n").unwrap();
        assert!(matches!(
            ContractManifest::load(&abi, &addr),
            Err(LedgerError::Manifest(_))
        ));
    }
}
