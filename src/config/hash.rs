//! Hashing of settings and generated files.
//!
//! Fingerprints let a report show whether two runs resolved the same
//! settings for a site, and digests identify exactly what was uploaded.

use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

/// Hasher for settings fingerprints and content digests.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a fingerprint of a settings mapping.
    ///
    /// Mapping keys are visited in sorted order, so two mappings holding
    /// the same entries hash the same regardless of declaration order.
    #[must_use]
    pub fn hash_settings(&self, settings: &Mapping) -> String {
        let mut hasher = Sha256::new();
        hash_mapping(&mut hasher, settings);
        hex::encode(hasher.finalize())
    }

    /// Computes the SHA-256 digest of raw content.
    #[must_use]
    pub fn hash_content(&self, content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => hasher.update(if *b { b"t" } else { b"f" }),
        Value::Number(n) => {
            hasher.update(b"#");
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update((s.len() as u64).to_be_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Sequence(items) => {
            hasher.update(b"[");
            hasher.update((items.len() as u64).to_be_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Mapping(mapping) => hash_mapping(hasher, mapping),
        Value::Tagged(tagged) => {
            hasher.update(b"!");
            hasher.update(tagged.tag.to_string().as_bytes());
            hash_value(hasher, &tagged.value);
        }
    }
}

fn hash_mapping(hasher: &mut Sha256, mapping: &Mapping) {
    // Sorted for determinism
    let mut entries: Vec<(String, &Value, &Value)> = mapping
        .iter()
        .map(|(k, v)| (serde_yaml::to_string(k).unwrap_or_default(), k, v))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    hasher.update(b"{");
    hasher.update((entries.len() as u64).to_be_bytes());
    for (_, key, value) in entries {
        hash_value(hasher, key);
        hash_value(hasher, value);
    }
}
