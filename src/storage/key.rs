//! Storage keys and reset selections

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Trimmed string naming a stored sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StorageKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for StorageKey {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl Borrow<str> for StorageKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StorageKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}

/// Which keys a reset removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelection {
    /// Wildcard `*`
    All,
    Keys(Vec<StorageKey>),
}

impl KeySelection {
    /// Parse a reset key list: `*`, or comma separated keys
    pub fn parse(key_list: &str) -> Self {
        if key_list.trim() == "*" {
            return Self::All;
        }

        Self::Keys(
            key_list
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(StorageKey::new)
                .collect(),
        )
    }
}
