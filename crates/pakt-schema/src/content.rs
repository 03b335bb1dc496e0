//! Content manifest: the deterministic listing of archive entries that a
//! package signature covers.
//!
//! The wire format is pretty-printed JSON:
//!
//! ```text
//! {
//!   "version": 1,
//!   "entries": [
//!     { "path": "lib/net45/A.dll", "hashes": [ { "algorithm": "SHA256", "value": "<base64>" } ] }
//!   ]
//! }
//! ```
//!
//! Entries are always sorted by path (ordinal), so the same archive content
//! serializes to the same bytes regardless of entry order in the zip.

use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use thiserror::Error;

use crate::hash::{Digest, HashAlgorithm, hash_reader_multi};

/// Current content manifest format version.
pub const CONTENT_MANIFEST_VERSION: u32 = 1;

/// Format versions this crate can read.
pub const SUPPORTED_CONTENT_MANIFEST_VERSIONS: &[u32] = &[CONTENT_MANIFEST_VERSION];

/// Errors raised when manifest bytes cannot be trusted.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The document has no `version` field.
    #[error("Manifest is missing its version field")]
    MissingVersion,

    /// The document declares a version this build does not understand.
    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(u32),

    /// The document is not well-formed.
    #[error("Malformed manifest: {0}")]
    Malformed(String),

    /// Two entries share the same path.
    #[error("Duplicate manifest entry: {0}")]
    DuplicateEntry(String),
}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// A digest tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashValue {
    /// Algorithm used.
    pub algorithm: HashAlgorithm,
    /// Digest bytes (base64 on the wire).
    pub value: Digest,
}

impl HashValue {
    /// Pair an algorithm with its digest.
    pub fn new(algorithm: HashAlgorithm, value: Digest) -> Self {
        Self { algorithm, value }
    }
}

/// Integrity record for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Archive-relative path with `/` separators.
    pub path: String,
    /// One digest per requested algorithm, in request order.
    pub hashes: Vec<HashValue>,
}

impl ManifestEntry {
    /// Create an entry, normalizing the path separator.
    pub fn new(path: &str, hashes: Vec<HashValue>) -> Self {
        Self {
            path: crate::normalize_entry_path(path),
            hashes,
        }
    }

    /// Hash an entry's uncompressed bytes under every requested algorithm.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while reading `reader`.
    pub fn compute(path: &str, reader: impl Read, algorithms: &[HashAlgorithm]) -> io::Result<Self> {
        let hashes = hash_reader_multi(reader, algorithms)?
            .into_iter()
            .map(|(algorithm, value)| HashValue::new(algorithm, value))
            .collect();
        Ok(Self::new(path, hashes))
    }

    /// The digest recorded for `algorithm`, if any.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&Digest> {
        self.hashes
            .iter()
            .find(|h| h.algorithm == algorithm)
            .map(|h| &h.value)
    }
}

/// The versioned, path-sorted listing of a package's content entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentManifest {
    version: u32,
    entries: Vec<ManifestEntry>,
}

#[derive(Serialize)]
struct ManifestDocument<'a> {
    version: u32,
    entries: &'a [ManifestEntry],
}

#[derive(Deserialize)]
struct RawManifestDocument {
    version: Option<u32>,
    #[serde(default)]
    entries: Vec<ManifestEntry>,
}

impl ContentManifest {
    /// Create a manifest; entries are sorted by path.
    pub fn new(version: u32, mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self { version, entries }
    }

    /// Hash every `(path, reader)` pair and build a current-version manifest.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error raised by any reader.
    pub fn build<I, R>(entries: I, algorithms: &[HashAlgorithm]) -> io::Result<Self>
    where
        I: IntoIterator<Item = (String, R)>,
        R: Read,
    {
        let entries = entries
            .into_iter()
            .map(|(path, reader)| ManifestEntry::compute(&path, reader, algorithms))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self::new(CONTENT_MANIFEST_VERSION, entries))
    }

    /// Format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Path-sorted entries.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Look up an entry by exact path.
    pub fn entry(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Every algorithm used by at least one entry, in first-seen order.
    pub fn algorithms(&self) -> Vec<HashAlgorithm> {
        let mut seen = Vec::new();
        for hash in self.entries.iter().flat_map(|e| &e.hashes) {
            if !seen.contains(&hash.algorithm) {
                seen.push(hash.algorithm);
            }
        }
        seen
    }

    /// Serialize to the canonical byte form.
    ///
    /// # Panics
    ///
    /// Never in practice: the document is plain structs with string keys.
    pub fn serialize(&self) -> Vec<u8> {
        let doc = ManifestDocument {
            version: self.version,
            entries: &self.entries,
        };
        serde_json::to_vec_pretty(&doc).expect("content manifest serializes to JSON")
    }

    /// Parse manifest bytes, failing closed on anything unexpected.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::MissingVersion`] or
    /// [`FormatError::UnsupportedVersion`] for version problems,
    /// [`FormatError::DuplicateEntry`] if a path repeats, and
    /// [`FormatError::Malformed`] for anything that is not a manifest.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, FormatError> {
        let raw: RawManifestDocument = serde_json::from_slice(bytes)?;
        let version = raw.version.ok_or(FormatError::MissingVersion)?;
        if !SUPPORTED_CONTENT_MANIFEST_VERSIONS.contains(&version) {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let manifest = Self::new(version, raw.entries);
        if let Some(pair) = manifest.entries.windows(2).find(|w| w[0].path == w[1].path) {
            return Err(FormatError::DuplicateEntry(pair[0].path.clone()));
        }
        Ok(manifest)
    }
}
