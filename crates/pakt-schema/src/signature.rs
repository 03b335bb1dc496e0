//! Signature manifest and signature value types.

use serde::{Deserialize, Serialize};

use crate::content::{FormatError, HashValue};
use crate::hash::{Digest, HashAlgorithm};

/// Current signature manifest format version.
pub const SIGNATURE_MANIFEST_VERSION: u32 = 1;

/// Binds the hash of a serialized [`ContentManifest`](crate::ContentManifest)
/// to a signature. This is the payload a provider signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureManifest {
    version: u32,
    hashes: Vec<HashValue>,
}

#[derive(Serialize)]
struct SignatureManifestDocument<'a> {
    version: u32,
    hashes: &'a [HashValue],
}

#[derive(Deserialize)]
struct RawSignatureManifestDocument {
    version: Option<u32>,
    #[serde(default)]
    hashes: Vec<HashValue>,
}

impl SignatureManifest {
    /// Create a current-version manifest from precomputed hashes.
    pub fn new(hashes: Vec<HashValue>) -> Self {
        Self {
            version: SIGNATURE_MANIFEST_VERSION,
            hashes,
        }
    }

    /// Hash serialized content-manifest bytes under one algorithm.
    pub fn for_content(content_manifest: &[u8], algorithm: HashAlgorithm) -> Self {
        Self::new(vec![HashValue::new(
            algorithm,
            algorithm.hash_bytes(content_manifest),
        )])
    }

    /// Format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Algorithm/hash pairs, in the order they were requested.
    pub fn hashes(&self) -> &[HashValue] {
        &self.hashes
    }

    /// The hash recorded for `algorithm`, if any.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&Digest> {
        self.hashes
            .iter()
            .find(|h| h.algorithm == algorithm)
            .map(|h| &h.value)
    }

    /// Canonical bytes; these are what a provider signs.
    ///
    /// # Panics
    ///
    /// Never in practice: the document is plain structs with string keys.
    pub fn serialize(&self) -> Vec<u8> {
        let doc = SignatureManifestDocument {
            version: self.version,
            hashes: &self.hashes,
        };
        serde_json::to_vec_pretty(&doc).expect("signature manifest serializes to JSON")
    }

    /// Parse signature manifest bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] for a missing or unknown version or for
    /// malformed input.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, FormatError> {
        let raw: RawSignatureManifestDocument = serde_json::from_slice(bytes)?;
        match raw.version {
            None => Err(FormatError::MissingVersion),
            Some(SIGNATURE_MANIFEST_VERSION) => Ok(Self {
                version: SIGNATURE_MANIFEST_VERSION,
                hashes: raw.hashes,
            }),
            Some(other) => Err(FormatError::UnsupportedVersion(other)),
        }
    }
}

/// Signature bytes produced by a signature provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
    hash_algorithm: HashAlgorithm,
}

impl Signature {
    /// Wrap provider output. Intended for signature provider implementations.
    pub fn new(bytes: Vec<u8>, hash_algorithm: HashAlgorithm) -> Self {
        Self {
            bytes,
            hash_algorithm,
        }
    }

    /// Raw signature bytes as stored in the archive.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hash algorithm the signed manifest was built with.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("len", &self.bytes.len())
            .field("hash_algorithm", &self.hash_algorithm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_content_hash() {
        let manifest = SignatureManifest::for_content(b"{}", HashAlgorithm::Sha384);
        assert_eq!(
            manifest.hash(HashAlgorithm::Sha384),
            Some(&HashAlgorithm::Sha384.hash_bytes(b"{}"))
        );
        assert!(manifest.hash(HashAlgorithm::Sha256).is_none());
    }

    #[test]
    fn round_trips_through_bytes() {
        let manifest = SignatureManifest::for_content(b"content", HashAlgorithm::Sha256);
        let decoded = SignatureManifest::deserialize(&manifest.serialize()).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn serializes_to_a_versioned_document() {
        let manifest = SignatureManifest::for_content(b"", HashAlgorithm::Sha512);
        let value: serde_json::Value = serde_json::from_slice(&manifest.serialize()).unwrap();
        assert_eq!(value["version"], SIGNATURE_MANIFEST_VERSION);
        assert_eq!(value["hashes"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(matches!(
            SignatureManifest::deserialize(br#"{"version": 2, "hashes": []}"#),
            Err(FormatError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            SignatureManifest::deserialize(br#"{"hashes": []}"#),
            Err(FormatError::MissingVersion)
        ));
    }
}
