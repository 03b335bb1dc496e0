//! Signing, verification and signature removal on on-disk packages.

mod common;

use chrono::{Duration, Utc};
use common::build_package;
use ed25519_dalek::{SigningKey, Verifier};
use pakt_core::{
    CancellationToken, Ed25519SignatureProvider, SignError, SignPackageRequest, SignatureProvider,
    SignedPackage, Signer, VerifyError, ZipPackage, is_signed, verify_package,
};
use pakt_schema::{
    ContentManifest, HashAlgorithm, MANIFEST_PATH, SIGNATURE_PATH, SignatureManifest,
};
use tempfile::TempDir;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn package(&self, entries: &[(&str, &[u8])]) -> ZipPackage {
        let path = self.temp_dir.path().join("A.1.0.0.pakt");
        std::fs::write(&path, build_package(entries)).expect("failed to write package");
        ZipPackage::open(path).expect("failed to open package")
    }
}

fn provider(seed: u8) -> Ed25519SignatureProvider {
    Ed25519SignatureProvider::new(SigningKey::from_bytes(&[seed; 32]))
}

fn current<S: SignatureProvider>(signer: &Signer<ZipPackage, S>) -> &ZipPackage {
    signer.package().expect("package lost")
}

const CONTENT: &[(&str, &[u8])] = &[
    ("lib/net45/A.dll", b"assembly"),
    ("content/readme.txt", b"hello"),
];

#[tokio::test]
async fn test_signed_manifest_hash_matches_signature_manifest() {
    let ctx = TestContext::new();
    let provider = provider(1);
    let key = provider.verifying_key();
    let mut signer = Signer::new(ctx.package(CONTENT), provider);

    let signature = signer
        .sign(&SignPackageRequest::default(), &CancellationToken::new())
        .await
        .expect("sign failed");

    let package = ZipPackage::open(current(&signer).path()).unwrap();
    let manifest_bytes = package.read_entry(MANIFEST_PATH).unwrap().unwrap();
    let manifest = ContentManifest::deserialize(&manifest_bytes).unwrap();
    assert_eq!(manifest.entries().len(), 2);
    assert!(manifest.entry("lib/net45/A.dll").is_some());

    // The signature covers a manifest whose hash is that of the stored bytes.
    let signature_manifest = SignatureManifest::for_content(&manifest_bytes, HashAlgorithm::Sha256);
    let raw = ed25519_dalek::Signature::from_slice(signature.bytes()).unwrap();
    assert!(key.verify(&signature_manifest.serialize(), &raw).is_ok());
    assert_eq!(
        package.read_entry(SIGNATURE_PATH).unwrap().unwrap(),
        signature.bytes()
    );

    let verified = verify_package(&package, &key, &CancellationToken::new()).unwrap();
    assert_eq!(verified.hash_algorithm, HashAlgorithm::Sha256);
    assert_eq!(verified.entries, 2);
}

#[tokio::test]
async fn test_tampered_package_fails_verification() {
    let ctx = TestContext::new();
    let provider = provider(2);
    let key = provider.verifying_key();
    let mut signer = Signer::new(ctx.package(CONTENT), provider);
    signer
        .sign(&SignPackageRequest::default(), &CancellationToken::new())
        .await
        .unwrap();

    let mut package = signer.into_package().expect("package lost");
    package.add_entry("lib/net45/Evil.dll", b"payload").unwrap();

    let err = verify_package(&package, &key, &CancellationToken::new()).unwrap_err();
    match err {
        VerifyError::ContentMismatch(path) => assert_eq!(path, "lib/net45/Evil.dll"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_wrong_key_fails_verification() {
    let ctx = TestContext::new();
    let mut signer = Signer::new(ctx.package(CONTENT), provider(3));
    signer
        .sign(&SignPackageRequest::new(HashAlgorithm::Sha384), &CancellationToken::new())
        .await
        .unwrap();

    let other_key = provider(4).verifying_key();
    let err =
        verify_package(current(&signer), &other_key, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, VerifyError::SignatureInvalid));
}

#[tokio::test]
async fn test_remove_all_signatures_is_idempotent() {
    let ctx = TestContext::new();
    let mut signer = Signer::new(ctx.package(CONTENT), provider(5));
    let token = CancellationToken::new();

    signer.remove_all_signatures(&token).await.unwrap();
    assert!(!is_signed(current(&signer)).unwrap());

    signer.sign(&SignPackageRequest::default(), &token).await.unwrap();
    assert!(is_signed(current(&signer)).unwrap());

    signer.remove_all_signatures(&token).await.unwrap();
    signer.remove_all_signatures(&token).await.unwrap();
    assert!(!is_signed(current(&signer)).unwrap());
    assert_eq!(current(&signer).read_entry(MANIFEST_PATH).unwrap(), None);
    assert_eq!(
        current(&signer).read_entry("content/readme.txt").unwrap(),
        Some(b"hello".to_vec())
    );

    let err = verify_package(
        current(&signer),
        &provider(5).verifying_key(),
        &CancellationToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, VerifyError::Unsigned));
}

#[tokio::test]
async fn test_expired_credential_leaves_package_unsigned() {
    let ctx = TestContext::new();
    let provider = provider(6).with_expiry(Utc::now() - Duration::days(1));
    let mut signer = Signer::new(ctx.package(CONTENT), provider);

    let err = signer
        .sign(&SignPackageRequest::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SignError::Provider(_)));
    assert!(!is_signed(current(&signer)).unwrap());
    assert_eq!(current(&signer).read_entry(MANIFEST_PATH).unwrap(), None);
}

#[tokio::test]
async fn test_refused_resign_keeps_previous_signature() {
    let ctx = TestContext::new();
    let key = provider(8).verifying_key();
    let mut signer = Signer::new(ctx.package(CONTENT), provider(8));
    let token = CancellationToken::new();
    signer.sign(&SignPackageRequest::default(), &token).await.unwrap();
    let package = signer.into_package().expect("package lost");

    let expired = provider(8).with_expiry(Utc::now() - Duration::days(1));
    let mut signer = Signer::new(package, expired);
    let err = signer
        .sign(&SignPackageRequest::new(HashAlgorithm::Sha384), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, SignError::Provider(_)));

    let package = ZipPackage::open(current(&signer).path()).unwrap();
    assert!(is_signed(&package).unwrap());
    let verified = verify_package(&package, &key, &token).unwrap();
    assert_eq!(verified.hash_algorithm, HashAlgorithm::Sha256);
    assert_eq!(verified.entries, 2);
}

#[tokio::test]
async fn test_non_signing_algorithm_is_rejected() {
    let ctx = TestContext::new();
    let mut signer = Signer::new(ctx.package(CONTENT), provider(7));

    let err = signer
        .sign(&SignPackageRequest::new(HashAlgorithm::Blake3), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SignError::InvalidRequest(_)));
    assert_eq!(pakt_core::Error::from(err).kind(), pakt_core::ErrorKind::InvalidArgument);
}
