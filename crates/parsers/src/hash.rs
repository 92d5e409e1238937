//! Content addressing for normalized snapshots.

use serde::Serialize;
use sha2::{Digest as _, Sha256};

/// SHA-256 hex digest over the canonical JSON encoding of a normalized
/// structure. Struct field order is fixed by the type definition, so
/// equal normalized data always produces an equal hash within one
/// parser version.
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hex digest of raw bytes (used for blob addressing).
pub fn bytes_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Probe {
        name: String,
        value: u32,
    }

    #[test]
    fn equal_values_hash_equal() {
        let a = Probe { name: "pro".into(), value: 49 };
        let b = Probe { name: "pro".into(), value: 49 };
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn different_values_hash_different() {
        let a = Probe { name: "pro".into(), value: 49 };
        let b = Probe { name: "pro".into(), value: 59 };
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let h = bytes_hash(b"hello");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
