//! Content and pattern hashing.

use serde_json::Value;
use sha2::{Digest, Sha256};
use veil_model::value_shape;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a report: SHA-256 over `topic`, a NUL byte, and `text`.
pub fn fingerprint(topic_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(topic_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `value` looks like a fingerprint (64 lowercase hex digits).
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}

/// Identifies a malformed-field pattern: field path plus value shape.
pub fn pattern_hash(field_path: &str, value: &Value) -> String {
    let digest = sha256_hex(format!("{field_path}|{}", value_shape(value)).as_bytes());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_separates_topic_and_text() {
        assert_ne!(fingerprint("1", "23"), fingerprint("12", "3"));
        assert!(is_fingerprint(&fingerprint("1", "abc")));
    }

    #[test]
    fn fingerprint_matches_known_digest() {
        assert_eq!(fingerprint("", ""), sha256_hex(&[0]));
    }

    #[test]
    fn pattern_hash_depends_on_shape_only() {
        let first = pattern_hash("metadata.narrative", &json!({"text": "a", "lang": "en"}));
        let second = pattern_hash("metadata.narrative", &json!({"lang": "fr", "text": "b"}));
        let other = pattern_hash("metadata.narrative", &json!({"body": "a"}));
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn rejects_non_hex_values() {
        assert!(!is_fingerprint("T001"));
        assert!(!is_fingerprint(&"G".repeat(64)));
    }
}
