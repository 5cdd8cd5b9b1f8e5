//! Snapshot Digests
//!
//! Deterministic SHA-256 digest of a stored document, used to tag
//! snapshots in logs so two clients can be compared line by line.

use sha2::{Digest, Sha256};

use crate::store::kv::Fields;

/// Digest output type (256 bits / 32 bytes)
pub type SnapshotDigest = [u8; 32];

/// Hasher with a domain separator.
pub struct SnapshotHasher {
    hasher: Sha256,
}

impl SnapshotHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for game documents.
    pub fn for_game_document() -> Self {
        Self::new(b"FOUR_ROW_DOCUMENT_V1")
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a length-prefixed string.
    pub fn update_str(&mut self, value: &str) {
        self.update_u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> SnapshotDigest {
        self.hasher.finalize().into()
    }
}

/// Digest of a document at a given revision.
///
/// `Fields` iterates in key order, so equal documents hash equally
/// regardless of write order.
pub fn document_digest(revision: u64, fields: &Fields) -> SnapshotDigest {
    let mut hasher = SnapshotHasher::for_game_document();
    hasher.update_u64(revision);
    for (key, value) in fields {
        hasher.update_str(key);
        hasher.update_str(&value.to_string());
    }
    hasher.finalize()
}

/// Short hex prefix for log lines.
pub fn short_digest(digest: &SnapshotDigest) -> String {
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_digest_independent_of_insert_order() {
        let a = fields(&[("currentPlayer", json!("X")), ("gameActive", json!(true))]);
        let b = fields(&[("gameActive", json!(true)), ("currentPlayer", json!("X"))]);
        assert_eq!(document_digest(3, &a), document_digest(3, &b));
    }

    #[test]
    fn test_digest_covers_revision_and_values() {
        let a = fields(&[("currentPlayer", json!("X"))]);
        let b = fields(&[("currentPlayer", json!("O"))]);
        assert_ne!(document_digest(1, &a), document_digest(2, &a));
        assert_ne!(document_digest(1, &a), document_digest(1, &b));
    }

    #[test]
    fn test_short_digest_is_eight_hex_chars() {
        let digest = document_digest(0, &Fields::new());
        assert_eq!(short_digest(&digest).len(), 8);
    }
}
