//! Resource key codec
//!
//! Maps an arbitrary resource name (typically a URL) to a filesystem-safe,
//! collision-resistant key. The key names the directory holding that
//! resource's chain, so it must be stable across processes: same name,
//! same key, forever.

use std::fmt;

use sha2::{Digest, Sha256};

/// Characters never allowed in a path segment, plus `.` which chain
/// filenames use as their field separator.
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '.'];

/// Written in place of each unsafe character.
const PLACEHOLDER: char = '_';

/// Sanitized names longer than this are truncated before the hash suffix.
const MAX_SANITIZED_LEN: usize = 100;

/// Hex chars of the name digest appended to every key.
const HASH_SUFFIX_LEN: usize = 8;

/// Filesystem-safe identifier for one resource's chain directory.
///
/// Immutable once derived; the stable identity of a resource's history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Derive the key for a resource name.
    ///
    /// Pure and total: every string is a valid name and always maps to the
    /// same key. Unsafe characters become underscores, the result is
    /// capped at 100 characters, and a hash of the *original* name is
    /// always appended — two names that sanitize or truncate to the same
    /// prefix still get distinct keys.
    pub fn from_name(name: &str) -> Self {
        let mut sanitized: String = name
            .chars()
            .map(|c| if UNSAFE_CHARS.contains(&c) { PLACEHOLDER } else { c })
            .collect();
        if sanitized.chars().count() > MAX_SANITIZED_LEN {
            sanitized = sanitized.chars().take(MAX_SANITIZED_LEN).collect();
        }

        let digest = Sha256::digest(name.as_bytes());
        let suffix = hex::encode(&digest[..HASH_SUFFIX_LEN / 2]);
        ResourceKey(format!("{sanitized}_{suffix}"))
    }

    /// The key as a path segment.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_deterministic() {
        let a = ResourceKey::from_name("https://example.com/page");
        let b = ResourceKey::from_name("https://example.com/page");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unsafe_chars_replaced() {
        let key = ResourceKey::from_name("https://a.b/c?d=e*f");
        let segment = key.as_str();
        for c in UNSAFE_CHARS {
            assert!(!segment.contains(*c), "key {segment} still contains {c:?}");
        }
    }

    #[test]
    fn test_dot_is_unsafe() {
        let key = ResourceKey::from_name("www.example.com");
        // Dots from the name are replaced; only the suffix separator remains.
        assert!(key.as_str().starts_with("www_example_com_"));
    }

    #[test]
    fn test_suffix_always_appended() {
        let key = ResourceKey::from_name("short");
        assert_eq!(key.as_str().chars().count(), "short".len() + 1 + HASH_SUFFIX_LEN);
    }

    #[test]
    fn test_long_name_truncated() {
        let name = "x".repeat(500);
        let key = ResourceKey::from_name(&name);
        assert_eq!(
            key.as_str().chars().count(),
            MAX_SANITIZED_LEN + 1 + HASH_SUFFIX_LEN
        );
    }

    #[test]
    fn test_same_truncated_prefix_distinct_keys() {
        // Both names sanitize and truncate to the same 100-char prefix;
        // the hash suffix must keep the keys apart.
        let a = format!("{}/alpha", "x".repeat(200));
        let b = format!("{}/beta", "x".repeat(200));
        let ka = ResourceKey::from_name(&a);
        let kb = ResourceKey::from_name(&b);
        assert_eq!(
            ka.as_str().chars().take(MAX_SANITIZED_LEN).collect::<String>(),
            kb.as_str().chars().take(MAX_SANITIZED_LEN).collect::<String>()
        );
        assert_ne!(ka, kb);
    }

    #[test]
    fn test_empty_name_is_valid() {
        let key = ResourceKey::from_name("");
        assert_eq!(key.as_str().chars().count(), 1 + HASH_SUFFIX_LEN);
        assert!(key.as_str().starts_with('_'));
    }

    #[test]
    fn test_unicode_name_preserved() {
        let key = ResourceKey::from_name("https://例え.jp/ページ");
        assert!(key.as_str().contains("例え"));
        assert_eq!(key, ResourceKey::from_name("https://例え.jp/ページ"));
    }

    #[test]
    fn test_display_matches_as_str() {
        let key = ResourceKey::from_name("abc");
        assert_eq!(format!("{key}"), key.as_str());
    }
}
