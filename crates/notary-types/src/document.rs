use std::fmt;

use serde::{Deserialize, Serialize};

/// Ledger-assigned identifier of a logical document (a lineage of versions).
///
/// Ids are handed out by the ledger in increasing order starting at 1. The
/// value `0` is reserved as the "no such document" sentinel returned by
/// `lookupByHash`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    /// The not-found sentinel.
    pub const NONE: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns `true` for the not-found sentinel.
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    pub fn assigned(self) -> Option<Self> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for DocumentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Version number within a document lineage.
///
/// Starts at 1 and grows by exactly one per accepted `addVersion`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version created by `addDocument`.
    pub const FIRST: Self = Self(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    /// The version that directly follows this one.
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Iterate `1..=self` in ascending order.
    pub fn up_to(self) -> impl Iterator<Item = Version> {
        (1..=self.0).map(Version)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_none() {
        assert!(DocumentId::NONE.is_none());
        assert_eq!(DocumentId::NONE.assigned(), None);
        assert_eq!(DocumentId::new(7).assigned(), Some(DocumentId::new(7)));
    }

    #[test]
    fn version_next_is_plus_one() {
        assert_eq!(Version::FIRST.get(), 1);
        assert_eq!(Version::FIRST.next(), Version::new(2));
    }

    #[test]
    fn version_up_to_is_gapless() {
        let all: Vec<u64> = Version::new(4).up_to().map(|v| v.get()).collect();
        assert_eq!(all, vec![1, 2, 3, 4]);
        assert_eq!(Version::new(0).up_to().count(), 0);
    }

    #[test]
    fn display_forms() {
        assert_eq!(DocumentId::new(3).to_string(), "#3");
        assert_eq!(Version::new(2).to_string(), "v2");
    }

    #[test]
    fn serde_is_transparent() {
        assert_eq!(serde_json::to_string(&DocumentId::new(9)).unwrap(), "9");
        let v: Version = serde_json::from_str("5").unwrap();
        assert_eq!(v, Version::new(5));
    }
}
