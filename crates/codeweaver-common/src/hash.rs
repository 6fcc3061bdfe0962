//! Content addressing with BLAKE3
//!
//! All content identity in CodeWeaver comes from one hash function: files,
//! settings fingerprints, and manifest entries are keyed by 256-bit BLAKE3
//! digests. One function, one invariant.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A 256-bit BLAKE3 digest, stored as its 64-character lowercase hex form.
///
/// Fixed width: constructors reject anything that is not exactly 64 hex
/// characters, so a `ContentHash` is always a well-formed digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a hex digest.
    ///
    /// # Errors
    ///
    /// Returns the offending string when it is not 64 lowercase hex chars.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, String> {
        let hex = hex.into();
        if hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(hex.to_ascii_lowercase()))
        } else {
            Err(hex)
        }
    }

    /// The hex digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash raw bytes with BLAKE3-256.
pub fn blake_hash(bytes: &[u8]) -> ContentHash {
    ContentHash(blake3::hash(bytes).to_hex().to_string())
}

/// Hash a file's contents with BLAKE3-256.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be read.
pub fn blake_hash_file(path: &Path) -> std::io::Result<ContentHash> {
    let bytes = std::fs::read(path)?;
    Ok(blake_hash(&bytes))
}

/// A map keyed by content hash.
///
/// Used wherever per-file metadata is addressed by digest rather than path,
/// so renames don't invalidate entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlakeStore<T> {
    entries: HashMap<ContentHash, T>,
}

impl<T> BlakeStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a value for a digest, returning the previous value if any.
    pub fn insert(&mut self, hash: ContentHash, value: T) -> Option<T> {
        self.entries.insert(hash, value)
    }

    /// Look up a value by digest.
    pub fn get(&self, hash: &ContentHash) -> Option<&T> {
        self.entries.get(hash)
    }

    /// Remove a digest's entry.
    pub fn remove(&mut self, hash: &ContentHash) -> Option<T> {
        self.entries.remove(hash)
    }

    /// Whether the digest is present.
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&ContentHash, &T)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake_hash_is_stable() {
        let a = blake_hash(b"fn main() {}");
        let b = blake_hash(b"fn main() {}");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_blake_hash_differs_on_content() {
        assert_ne!(blake_hash(b"a"), blake_hash(b"b"));
    }

    #[test]
    fn test_content_hash_rejects_malformed() {
        assert!(ContentHash::from_hex("deadbeef").is_err());
        assert!(ContentHash::from_hex("z".repeat(64)).is_err());
        let valid = blake_hash(b"x");
        assert!(ContentHash::from_hex(valid.as_str()).is_ok());
    }

    #[test]
    fn test_blake_store_roundtrip() {
        let mut store = BlakeStore::new();
        let hash = blake_hash(b"content");
        assert!(store.insert(hash.clone(), 42usize).is_none());
        assert_eq!(store.get(&hash), Some(&42));
        assert!(store.contains(&hash));
        assert_eq!(store.remove(&hash), Some(42));
        assert!(store.is_empty());
    }
}
