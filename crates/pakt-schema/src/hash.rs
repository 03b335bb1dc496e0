//! Hash algorithms, streaming hashers and digests.

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest as _;
use std::io::{self, Read};

/// Buffer size for streaming hashes; entries are never read in one shot.
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Hash algorithms understood by content and signature manifests.
///
/// The SHA-2 family is accepted for signing. BLAKE3 is available for fast
/// local integrity checks but is not a signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,
    /// SHA-384.
    #[serde(rename = "SHA384")]
    Sha384,
    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
    /// BLAKE3 (256-bit output).
    #[serde(rename = "BLAKE3")]
    Blake3,
}

impl HashAlgorithm {
    /// Algorithms a signature may be requested with.
    pub const SIGNING: &[Self] = &[Self::Sha256, Self::Sha384, Self::Sha512];

    /// Canonical name as written in manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns `true` if the algorithm may be used to sign packages.
    pub fn is_signing_algorithm(self) -> bool {
        Self::SIGNING.contains(&self)
    }

    /// Start an incremental hash.
    pub fn hasher(self) -> Hasher {
        match self {
            Self::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            Self::Sha384 => Hasher::Sha384(sha2::Sha384::new()),
            Self::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
            Self::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// Hash an in-memory buffer.
    pub fn hash_bytes(self, data: &[u8]) -> Digest {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Hash a stream to its end.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by `reader`.
    pub fn hash_reader(self, reader: impl Read) -> io::Result<Digest> {
        let mut digests = hash_reader_multi(reader, &[self])?;
        Ok(digests.remove(0).1)
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            "blake3" => Ok(Self::Blake3),
            _ => Err(format!("Unknown hash algorithm: {s}")),
        }
    }
}

/// An in-progress hash for one [`HashAlgorithm`].
#[derive(Debug, Clone)]
pub enum Hasher {
    /// SHA-256 state.
    Sha256(sha2::Sha256),
    /// SHA-384 state.
    Sha384(sha2::Sha384),
    /// SHA-512 state.
    Sha512(sha2::Sha512),
    /// BLAKE3 state.
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Finish and return the digest.
    pub fn finalize(self) -> Digest {
        match self {
            Self::Sha256(h) => Digest(h.finalize().to_vec()),
            Self::Sha384(h) => Digest(h.finalize().to_vec()),
            Self::Sha512(h) => Digest(h.finalize().to_vec()),
            Self::Blake3(h) => Digest(h.finalize().as_bytes().to_vec()),
        }
    }
}

/// Hash one stream under several algorithms in a single streaming pass.
///
/// # Errors
///
/// Returns any I/O error raised by `reader`.
pub fn hash_reader_multi(
    mut reader: impl Read,
    algorithms: &[HashAlgorithm],
) -> io::Result<Vec<(HashAlgorithm, Digest)>> {
    let mut hashers: Vec<(HashAlgorithm, Hasher)> =
        algorithms.iter().map(|a| (*a, a.hasher())).collect();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for (_, hasher) in &mut hashers {
            hasher.update(&buffer[..n]);
        }
    }

    Ok(hashers
        .into_iter()
        .map(|(alg, hasher)| (alg, hasher.finalize()))
        .collect())
}

/// Raw digest bytes. Serialized as standard base64.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest(Vec<u8>);

impl Digest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a base64 digest.
    ///
    /// # Errors
    ///
    /// Returns the decode error if `s` is not valid standard base64.
    pub fn from_base64(s: &str) -> Result<Self, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD
            .decode(s.trim())
            .map(Self)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Standard base64 encoding.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}
