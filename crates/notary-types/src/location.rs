use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque pointer into content-addressed blob storage, e.g. an IPFS CID.
///
/// The registry never interprets the value; it only requires it to be
/// non-empty so a record always points at retrievable bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageLocation(String);

impl StorageLocation {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TypeError::EmptyLocation);
        }
        Ok(Self(value))
    }

    /// Wrap a value read back from the ledger, which may legitimately be
    /// empty in the all-zero "not found" record.
    pub fn from_ledger(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageLocation({})", self.0)
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank() {
        assert_eq!(StorageLocation::new("").unwrap_err(), TypeError::EmptyLocation);
        assert_eq!(StorageLocation::new("   ").unwrap_err(), TypeError::EmptyLocation);
    }

    #[test]
    fn keeps_value() {
        let loc = StorageLocation::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").unwrap();
        assert_eq!(loc.as_str(), "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
        assert_eq!(format!("{loc}"), loc.as_str());
    }
}
