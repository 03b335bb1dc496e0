//! Install, extraction and signing engine for pakt packages.
//!
//! The pieces compose leaves first:
//!
//! - [`resolver`] picks the asset group that applies to a target framework.
//! - [`archive`] reads asset groups and content manifests out of a package.
//! - [`signing`] writes and verifies the content manifest and signature.
//! - [`extract`] materializes a package (and its satellite resources) on disk.
//! - [`references`] persists the project's installed-package list.
//! - [`project`] orchestrates install and uninstall against a build system.

pub mod archive;
pub mod error;
pub mod extract;
pub mod paths;
pub mod references;
pub mod reporter;
pub mod resolver;
pub mod signing;

pub mod project;

pub use archive::{ArchiveError, PackageReader, ZipPackage};
pub use error::{Error, ErrorKind};
pub use extract::{ExtractError, ExtractionOptions, ExtractionResult, PackageSaveMode};
pub use paths::PackagePathResolver;
pub use project::{
    ConfigError, InstallContext, InstallError, InstallOutcome, InstallSummary, ProjectConfig,
    ProjectInstaller, ProjectSystem, UninstallOutcome,
};
pub use references::{
    AddOutcome, PackageReference, ReferenceListError, ReferenceListStore, ReferenceSnapshot,
    RemoveOutcome,
};
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use signing::{
    Ed25519SignatureProvider, ProviderError, SignError, SignPackageRequest, SignatureProvider,
    SignedPackage, Signer, VerifiedSignature, VerifyError, is_signed, verify_package,
};

pub use tokio_util::sync::CancellationToken;
