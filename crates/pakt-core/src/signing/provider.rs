//! Signature providers.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use pakt_schema::{Signature, SignatureManifest};
use thiserror::Error;

use super::SignPackageRequest;

/// Reasons a provider refuses to sign.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The signing credential is past its expiry.
    #[error("Signing credential expired at {0}")]
    CredentialExpired(DateTime<Utc>),

    /// The key material is unusable.
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    /// The manifest does not carry a hash for the requested algorithm.
    #[error("Signature manifest has no {0} hash")]
    MissingHash(pakt_schema::HashAlgorithm),

    /// Provider-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Performs the cryptographic part of signing.
///
/// The signer hands over the [`SignatureManifest`] and stores whatever bytes
/// come back; it never looks inside them.
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    /// Sign `manifest` for `request`.
    async fn create_signature(
        &self,
        request: &SignPackageRequest,
        manifest: &SignatureManifest,
    ) -> Result<Signature, ProviderError>;
}

/// Ed25519 signatures over the serialized signature manifest.
pub struct Ed25519SignatureProvider {
    key: SigningKey,
    expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Ed25519SignatureProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519SignatureProvider")
            .field("public_key", &self.public_key_base64())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Ed25519SignatureProvider {
    /// Provider for an in-memory key without expiry.
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            expires_at: None,
        }
    }

    /// Load a key from a base64-encoded 32-byte secret.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidKey`] if the input is not base64 or
    /// not 32 bytes.
    pub fn from_base64(secret: &str) -> Result<Self, ProviderError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(secret.trim())
            .map_err(|e| ProviderError::InvalidKey(e.to_string()))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ProviderError::InvalidKey("Key must be 32 bytes".to_string()))?;
        Ok(Self::new(SigningKey::from_bytes(&secret)))
    }

    /// Refuse to sign after `expires_at`.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Public half of the key, for verification.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Public key as standard base64.
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.key.verifying_key().to_bytes())
    }
}

#[async_trait]
impl SignatureProvider for Ed25519SignatureProvider {
    async fn create_signature(
        &self,
        request: &SignPackageRequest,
        manifest: &SignatureManifest,
    ) -> Result<Signature, ProviderError> {
        if let Some(expires_at) = self.expires_at.filter(|at| *at <= Utc::now()) {
            return Err(ProviderError::CredentialExpired(expires_at));
        }
        if manifest.hash(request.hash_algorithm).is_none() {
            return Err(ProviderError::MissingHash(request.hash_algorithm));
        }

        let signature = self.key.sign(&manifest.serialize());
        Ok(Signature::new(
            signature.to_bytes().to_vec(),
            request.hash_algorithm,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;
    use pakt_schema::HashAlgorithm;

    #[tokio::test]
    async fn signature_verifies_against_public_key() {
        let provider = Ed25519SignatureProvider::new(SigningKey::from_bytes(&[1u8; 32]));
        let manifest = SignatureManifest::for_content(b"manifest", HashAlgorithm::Sha256);
        let signature = provider
            .create_signature(&SignPackageRequest::default(), &manifest)
            .await
            .unwrap();

        let raw = ed25519_dalek::Signature::from_slice(signature.bytes()).unwrap();
        assert!(provider.verifying_key().verify(&manifest.serialize(), &raw).is_ok());
        assert_eq!(signature.hash_algorithm(), HashAlgorithm::Sha256);
    }

    #[tokio::test]
    async fn expired_credential_is_rejected() {
        let provider = Ed25519SignatureProvider::new(SigningKey::from_bytes(&[1u8; 32]))
            .with_expiry(Utc::now() - chrono::Duration::hours(1));
        let manifest = SignatureManifest::for_content(b"m", HashAlgorithm::Sha256);
        let err = provider
            .create_signature(&SignPackageRequest::default(), &manifest)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::CredentialExpired(_)));
    }

    #[test]
    fn loads_base64_secret() {
        let secret = base64::engine::general_purpose::STANDARD.encode([9u8; 32]);
        let provider = Ed25519SignatureProvider::from_base64(&secret).unwrap();
        assert_eq!(
            provider.verifying_key(),
            SigningKey::from_bytes(&[9u8; 32]).verifying_key()
        );
        assert!(Ed25519SignatureProvider::from_base64("c2hvcnQ=").is_err());
        assert!(Ed25519SignatureProvider::from_base64("!!").is_err());
    }
}
