//! Package signing.
//!
//! A signed package carries two extra entries:
//!
//! - `.signature/manifest.json`: the [`ContentManifest`] of every other entry.
//! - `.signature/signature.sig`: the provider's signature over the
//!   [`SignatureManifest`] that binds the manifest bytes' hash.
//!
//! Neither entry is part of the content that gets hashed, and neither is
//! extracted to disk.

mod provider;
mod verify;

pub use provider::{Ed25519SignatureProvider, ProviderError, SignatureProvider};
pub use verify::{VerifiedSignature, VerifyError, is_signed, verify_package};

use pakt_schema::{
    ContentManifest, HashAlgorithm, MANIFEST_PATH, SIGNATURE_PATH, SIGNING_PATHS, Signature,
    SignatureManifest,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive::ArchiveError;

/// Errors raised by [`Signer`].
#[derive(Error, Debug)]
pub enum SignError {
    /// The request cannot be honoured (e.g. a non-signing hash algorithm).
    #[error("Invalid signing request: {0}")]
    InvalidRequest(String),

    /// The signature provider refused to sign.
    #[error("Signature provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Reading or rewriting the archive failed.
    #[error("Archive error: {0}")]
    Archive(ArchiveError),

    /// Underlying storage failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled between entries.
    #[error("Operation cancelled")]
    Cancelled,

    /// A blocking archive task panicked and took the package with it.
    #[error("Package unavailable: {0}")]
    PackageUnavailable(String),
}

impl From<ArchiveError> for SignError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Cancelled => Self::Cancelled,
            ArchiveError::Io(e) => Self::Io(e),
            other => Self::Archive(other),
        }
    }
}

/// A package the signer can read from and write signature entries into.
pub trait SignedPackage {
    /// Content manifest over every non-directory, non-signing entry.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Cancelled`] if `token` fires between entries.
    fn content_manifest(
        &self,
        algorithms: &[HashAlgorithm],
        token: &CancellationToken,
    ) -> Result<ContentManifest, ArchiveError>;

    /// Read one entry, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the archive cannot be read.
    fn read_entry(&self, path: &str) -> Result<Option<Vec<u8>>, ArchiveError>;

    /// Append a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EntryExists`] if `path` is already present.
    fn add_entry(&mut self, path: &str, bytes: &[u8]) -> Result<(), ArchiveError>;

    /// Delete every entry whose path matches one of `paths`. Returns how
    /// many entries were removed.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the archive cannot be rewritten.
    fn remove_entries(&mut self, paths: &[&str]) -> Result<usize, ArchiveError>;
}

/// Parameters of one signing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignPackageRequest {
    /// Algorithm for both the content manifest and the signature manifest.
    pub hash_algorithm: HashAlgorithm,
    /// Optional human-readable signer name, passed through to the provider.
    pub signer_name: Option<String>,
}

impl SignPackageRequest {
    /// Request signing with `hash_algorithm`.
    pub fn new(hash_algorithm: HashAlgorithm) -> Self {
        Self {
            hash_algorithm,
            signer_name: None,
        }
    }

    /// Attach a signer name.
    pub fn with_signer_name(mut self, name: impl Into<String>) -> Self {
        self.signer_name = Some(name.into());
        self
    }
}

impl Default for SignPackageRequest {
    fn default() -> Self {
        Self::new(HashAlgorithm::Sha256)
    }
}

/// Writes and removes signature entries. Keeps no state between calls; every
/// call re-reads the package's current entries.
///
/// Archive reads and rewrites run on the blocking pool, so the package is
/// moved into each task and handed back when it finishes.
#[derive(Debug)]
pub struct Signer<P, S> {
    package: Option<P>,
    provider: S,
}

impl<P, S> Signer<P, S>
where
    P: SignedPackage + Send + 'static,
    S: SignatureProvider,
{
    /// Pair a package with a signature provider.
    pub fn new(package: P, provider: S) -> Self {
        Self {
            package: Some(package),
            provider,
        }
    }

    /// The package being signed; `None` once a blocking task has panicked.
    pub fn package(&self) -> Option<&P> {
        self.package.as_ref()
    }

    /// Release the package.
    pub fn into_package(self) -> Option<P> {
        self.package
    }

    /// Sign the package.
    ///
    /// Any existing signature is replaced; a package carries at most one
    /// primary signature. Nothing is written until the provider has signed,
    /// so a provider failure leaves the package, and any signature it
    /// already carries, untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidRequest`] for a non-signing algorithm,
    /// [`SignError::Provider`] if the provider refuses, and
    /// [`SignError::Cancelled`] if `token` fires.
    pub async fn sign(
        &mut self,
        request: &SignPackageRequest,
        token: &CancellationToken,
    ) -> Result<Signature, SignError> {
        let algorithm = request.hash_algorithm;
        if !algorithm.is_signing_algorithm() {
            return Err(SignError::InvalidRequest(format!(
                "{algorithm} is not an allowed signing hash algorithm"
            )));
        }
        if token.is_cancelled() {
            return Err(SignError::Cancelled);
        }

        // Signing entries are outside the content, so an old signature does
        // not change the manifest.
        let manifest_token = token.clone();
        let (entries, manifest_bytes) = self
            .with_package(move |package| {
                let manifest = package.content_manifest(&[algorithm], &manifest_token)?;
                Ok((manifest.entries().len(), manifest.serialize()))
            })
            .await?;
        let signature_manifest = SignatureManifest::for_content(&manifest_bytes, algorithm);

        let signature = self
            .provider
            .create_signature(request, &signature_manifest)
            .await?;
        if token.is_cancelled() {
            return Err(SignError::Cancelled);
        }

        let signature_bytes = signature.bytes().to_vec();
        self.with_package(move |package| {
            let removed = package.remove_entries(SIGNING_PATHS)?;
            if removed > 0 {
                debug!(removed, "replacing existing signature");
            }
            package.add_entry(MANIFEST_PATH, &manifest_bytes)?;
            package.add_entry(SIGNATURE_PATH, &signature_bytes)?;
            Ok(())
        })
        .await?;

        info!(
            entries,
            %algorithm,
            signer = request.signer_name.as_deref().unwrap_or("-"),
            "package signed"
        );
        Ok(signature)
    }

    /// Delete every signing entry. A no-op on an unsigned package.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::Cancelled`] if `token` has fired, or an archive
    /// error if the package cannot be rewritten.
    pub async fn remove_all_signatures(&mut self, token: &CancellationToken) -> Result<(), SignError> {
        if token.is_cancelled() {
            return Err(SignError::Cancelled);
        }
        let removed = self
            .with_package(|package| Ok(package.remove_entries(SIGNING_PATHS)?))
            .await?;
        debug!(removed, "removed signature entries");
        Ok(())
    }

    /// Remove a signature from the package.
    ///
    /// Current policy removes all signatures; per-signature removal and
    /// counter-signature preservation are not supported.
    ///
    /// # Errors
    ///
    /// As [`Signer::remove_all_signatures`].
    pub async fn remove_signature(
        &mut self,
        signature: &Signature,
        token: &CancellationToken,
    ) -> Result<(), SignError> {
        debug!(?signature, "removing all signatures");
        self.remove_all_signatures(token).await
    }

    /// Run `op` against the package on the blocking pool.
    async fn with_package<T, F>(&mut self, op: F) -> Result<T, SignError>
    where
        T: Send + 'static,
        F: FnOnce(&mut P) -> Result<T, SignError> + Send + 'static,
    {
        let Some(mut package) = self.package.take() else {
            return Err(SignError::PackageUnavailable(
                "lost in an earlier failed task".to_string(),
            ));
        };
        let (package, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut package);
            (package, result)
        })
        .await
        .map_err(|e| SignError::PackageUnavailable(format!("Task panic: {e}")))?;
        self.package = Some(package);
        result
    }
}
