//! Signature verification and tamper detection.

use ed25519_dalek::{Verifier, VerifyingKey};
use pakt_schema::{
    ContentManifest, FormatError, HashAlgorithm, MANIFEST_PATH, SIGNATURE_PATH, SignatureManifest,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::SignedPackage;
use crate::archive::ArchiveError;

/// Reasons a package fails verification.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The package has no signature entry.
    #[error("Package is not signed")]
    Unsigned,

    /// The signature entry exists but the manifest entry does not.
    #[error("Signed package has no content manifest")]
    MissingManifest,

    /// The stored manifest cannot be parsed.
    #[error("Invalid content manifest: {0}")]
    Format(#[from] FormatError),

    /// The signature does not match the manifest under this key.
    #[error("Signature does not verify")]
    SignatureInvalid,

    /// An entry was added, removed or modified after signing.
    #[error("Package content does not match its manifest: {0}")]
    ContentMismatch(String),

    /// Reading the archive failed.
    #[error("Archive error: {0}")]
    Archive(ArchiveError),

    /// The operation was cancelled between entries.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<ArchiveError> for VerifyError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Cancelled => Self::Cancelled,
            other => Self::Archive(other),
        }
    }
}

/// Facts about a signature that verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    /// Hash algorithm the signed manifest was built with.
    pub hash_algorithm: HashAlgorithm,
    /// Number of content entries covered.
    pub entries: usize,
}

/// Returns `true` if the package carries a signature entry.
///
/// # Errors
///
/// Returns an [`ArchiveError`] if the archive cannot be read.
pub fn is_signed<P: SignedPackage + ?Sized>(package: &P) -> Result<bool, ArchiveError> {
    Ok(package.read_entry(SIGNATURE_PATH)?.is_some())
}

/// Check a package's signature and that its content still matches the
/// signed manifest.
///
/// # Errors
///
/// Returns [`VerifyError::Unsigned`] for an unsigned package,
/// [`VerifyError::SignatureInvalid`] if the signature does not verify under
/// `key`, and [`VerifyError::ContentMismatch`] naming the first entry that
/// differs from the manifest.
pub fn verify_package<P: SignedPackage + ?Sized>(
    package: &P,
    key: &VerifyingKey,
    token: &CancellationToken,
) -> Result<VerifiedSignature, VerifyError> {
    let signature_bytes = package
        .read_entry(SIGNATURE_PATH)?
        .ok_or(VerifyError::Unsigned)?;
    let manifest_bytes = package
        .read_entry(MANIFEST_PATH)?
        .ok_or(VerifyError::MissingManifest)?;
    let stored = ContentManifest::deserialize(&manifest_bytes)?;

    let signature = ed25519_dalek::Signature::from_slice(&signature_bytes)
        .map_err(|_| VerifyError::SignatureInvalid)?;

    // An empty manifest does not say which algorithm was used.
    let candidates = match stored.algorithms() {
        algorithms if algorithms.is_empty() => HashAlgorithm::SIGNING.to_vec(),
        algorithms => algorithms,
    };
    let hash_algorithm = candidates
        .iter()
        .copied()
        .find(|algorithm| {
            let payload = SignatureManifest::for_content(&manifest_bytes, *algorithm).serialize();
            key.verify(&payload, &signature).is_ok()
        })
        .ok_or(VerifyError::SignatureInvalid)?;

    let actual = package.content_manifest(&[hash_algorithm], token)?;
    if let Some(path) = first_mismatch(&stored, &actual, hash_algorithm) {
        warn!(%path, "package content differs from signed manifest");
        return Err(VerifyError::ContentMismatch(path));
    }

    debug!(entries = actual.entries().len(), %hash_algorithm, "signature verified");
    Ok(VerifiedSignature {
        hash_algorithm,
        entries: actual.entries().len(),
    })
}

fn first_mismatch(
    stored: &ContentManifest,
    actual: &ContentManifest,
    algorithm: HashAlgorithm,
) -> Option<String> {
    for entry in actual.entries() {
        let expected = stored.entry(&entry.path).and_then(|e| e.hash(algorithm));
        if expected != entry.hash(algorithm) {
            return Some(entry.path.clone());
        }
    }
    stored
        .entries()
        .iter()
        .find(|e| actual.entry(&e.path).is_none())
        .map(|e| e.path.clone())
}
