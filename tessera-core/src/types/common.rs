//! Common identifier and digest types
//!
//! Tessera uses SHA-512 for every integrity check. Digests travel as
//! 128-character lowercase hex strings so they can be embedded in audit
//! metadata and anchor payloads without re-encoding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// SHA-512 digest, hex encoded (128 characters)
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha512Digest(String);

impl Sha512Digest {
    /// Compute the digest of a byte slice
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse from a hex string
    pub fn from_hex(s: &str) -> CoreResult<Self> {
        if s.len() != 128 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::Validation(format!(
                "invalid SHA-512 hex digest (len {})",
                s.len()
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The hex representation
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Sha512Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha512Digest({}..)", &self.0[..16])
    }
}

impl fmt::Display for Sha512Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document identifier, unique within an organization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant / organization identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content set identifier - a short opaque string unique within a document
/// (e.g. "CS-PUBLIC"). Its UTF-8 bytes are the AAD when the set's envelope
/// is encrypted, binding ciphertext to set identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentSetId(String);

impl ContentSetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// AAD bytes for envelope encryption
    pub fn aad_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ContentSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encryption key record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque HSM key handle. Key material never leaves the HSM boundary;
/// persisted records reference keys only through this handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHandle(String);

impl KeyHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_compute() {
        let digest = Sha512Digest::compute(b"tessera");
        assert_eq!(digest.as_hex().len(), 128);
        // SHA-512 is deterministic
        assert_eq!(digest, Sha512Digest::compute(b"tessera"));
        assert_ne!(digest, Sha512Digest::compute(b"tesserae"));
    }

    #[test]
    fn test_digest_from_hex_roundtrip() {
        let digest = Sha512Digest::compute(b"data");
        let parsed = Sha512Digest::from_hex(digest.as_hex()).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn test_digest_from_hex_rejects_bad_input() {
        assert!(Sha512Digest::from_hex("abc").is_err());
        assert!(Sha512Digest::from_hex(&"zz".repeat(64)).is_err());
    }

    #[test]
    fn test_content_set_aad_bytes() {
        let id = ContentSetId::new("CS-PUBLIC");
        assert_eq!(id.aad_bytes(), b"CS-PUBLIC");
    }
}
