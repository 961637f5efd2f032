use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Exact set-key/value removals needed to forget one token pair
///
/// Serialized as a JSON object whose keys are set keys and whose values are
/// the members to strip from them. Keys are kept sorted, so two instruction
/// sets describing the same pair always serialize to the same string; the
/// expiry index relies on this to find an entry again by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemovalInstructions(BTreeMap<String, String>);

impl RemovalInstructions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a removal of `value` from the set at `key`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Canonical string form stored as the expiry index member
    pub fn to_canonical_string(&self) -> Result<String> {
        serde_json::to_string(&self.0)
            .map_err(|e| Error::serialization(format!("Failed to encode removal instructions: {e}")))
    }

    /// Parse an expiry index member
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::serialization(format!("Failed to decode removal instructions: {e}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
