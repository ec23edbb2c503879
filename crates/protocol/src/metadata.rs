//! `Upload-Metadata` serialization.
//!
//! Each entry is rendered as `key` when it has no value, or as
//! `key base64(value)` otherwise; entries are joined with commas.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Rejected metadata key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata key is empty")]
    EmptyKey,

    #[error("metadata key {0:?} must be ASCII without spaces or commas")]
    InvalidKey(String),
}

/// Ordered set of upload metadata entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, Option<Vec<u8>>>,
}

impl Metadata {
    /// Creates an empty metadata set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous value under the same key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Option<Vec<u8>>,
    ) -> Result<(), MetadataError> {
        let key = key.into();
        validate_key(&key)?;
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the entries into a single `Upload-Metadata` value.
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| match value {
                Some(bytes) => format!("{key} {}", STANDARD.encode(bytes)),
                None => key.clone(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn validate_key(key: &str) -> Result<(), MetadataError> {
    if key.is_empty() {
        return Err(MetadataError::EmptyKey);
    }
    let valid = key
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != ' ' && c != ',');
    if !valid {
        return Err(MetadataError::InvalidKey(key.to_string()));
    }
    Ok(())
}
