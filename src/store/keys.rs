//! Content keys and tree store IDs.
//!
//! Both end up as path components under the store root, so both are
//! validated on construction rather than sanitized on use.

use crate::constants::{BLOB_KEY_PREFIX, TREE_STORE_ID_PREFIX};
use crate::error::{Error, Result};
use sha2::{Digest, Sha512};
use std::fmt;

/// Length of a hex-encoded SHA-512 digest.
const SHA512_HEX_LEN: usize = 128;

fn invalid(key: &str, reason: impl Into<String>) -> Error {
    Error::InvalidKey {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Content key of an image blob: `sha512-<128 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobKey(String);

impl BlobKey {
    /// Parses a full content key.
    pub fn parse(key: &str) -> Result<Self> {
        let hash = key
            .strip_prefix(BLOB_KEY_PREFIX)
            .ok_or_else(|| invalid(key, format!("missing '{}' prefix", BLOB_KEY_PREFIX)))?;
        if hash.len() != SHA512_HEX_LEN {
            return Err(invalid(
                key,
                format!("expected {} hex characters, got {}", SHA512_HEX_LEN, hash.len()),
            ));
        }
        if !hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            return Err(invalid(key, "hash must be lowercase hexadecimal"));
        }
        Ok(Self(key.to_string()))
    }

    /// Computes the content key of `data`.
    pub fn from_data(data: &[u8]) -> Self {
        Self(format!("{}{}", BLOB_KEY_PREFIX, hex::encode(Sha512::digest(data))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a rendered filesystem in the tree store.
///
/// Opaque to this crate apart from path safety: a single non-empty path
/// component of printable ASCII.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeStoreId(String);

impl TreeStoreId {
    /// Validates an ID read from disk.
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(invalid(id, "empty tree store ID"));
        }
        if id == "." || id == ".." {
            return Err(invalid(id, "relative path component"));
        }
        if !id.chars().all(|c| c.is_ascii_graphic() && c != '/' && c != '\\') {
            return Err(invalid(id, "must be a single printable path component"));
        }
        Ok(Self(id.to_string()))
    }

    /// Derives the ID of the filesystem rendered from an image and its
    /// dependencies, in dependency order.
    pub fn derive(keys: &[BlobKey]) -> Self {
        let mut hasher = Sha512::new();
        for key in keys {
            hasher.update(key.as_str().as_bytes());
        }
        Self(format!(
            "{}{}{}",
            TREE_STORE_ID_PREFIX,
            BLOB_KEY_PREFIX,
            hex::encode(hasher.finalize())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TreeStoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_key_from_data_parses() {
        let key = BlobKey::from_data(b"hello world");
        assert!(key.as_str().starts_with("sha512-"));
        assert_eq!(BlobKey::parse(key.as_str()).unwrap(), key);
    }

    #[test]
    fn test_blob_key_rejects_traversal() {
        assert!(BlobKey::parse("sha512-../../etc/passwd").is_err());
        assert!(BlobKey::parse("sha256-abcd").is_err());
    }

    #[test]
    fn test_tree_store_id_rejects_separators() {
        assert!(TreeStoreId::parse("../escape").is_err());
        assert!(TreeStoreId::parse("a/b").is_err());
        assert!(TreeStoreId::parse("..").is_err());
        assert!(TreeStoreId::parse("").is_err());
        assert_eq!(TreeStoreId::parse("deps-sha512-ab\n").unwrap().as_str(), "deps-sha512-ab");
    }

    #[test]
    fn test_tree_store_id_derivation_depends_on_order() {
        let a = BlobKey::from_data(b"a");
        let b = BlobKey::from_data(b"b");
        let ab = TreeStoreId::derive(&[a.clone(), b.clone()]);
        let ba = TreeStoreId::derive(&[b, a.clone()]);
        assert_ne!(ab, ba);
        assert_eq!(ab, TreeStoreId::derive(&[a, BlobKey::from_data(b"b")]));
        assert!(ab.as_str().starts_with("deps-sha512-"));
        assert!(TreeStoreId::parse(ab.as_str()).is_ok());
    }
}
