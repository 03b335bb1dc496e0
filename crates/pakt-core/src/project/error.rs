//! Installer error types.

use pakt_schema::{Framework, PackageIdentity};
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::extract::ExtractError;
use crate::references::ReferenceListError;

/// Errors raised by [`ProjectInstaller`](super::ProjectInstaller).
#[derive(Error, Debug)]
pub enum InstallError {
    /// No library, framework-reference or content group applies to the
    /// project's framework.
    #[error("Package {identity} has no assets compatible with {framework}")]
    IncompatiblePackage {
        /// Package that was rejected.
        identity: PackageIdentity,
        /// Project framework it was checked against.
        framework: Framework,
    },

    /// A step that has no implementation yet.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// The build-system adapter rejected a call.
    #[error("Project system error: {0}")]
    ProjectSystem(String),

    /// Writing or removing package files failed.
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// Reading or writing the reference list failed.
    #[error("Reference list error: {0}")]
    References(#[from] ReferenceListError),

    /// The package archive could not be read.
    #[error("Archive error: {0}")]
    Archive(ArchiveError),

    /// Underlying storage failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled between steps.
    #[error("Operation cancelled")]
    Cancelled,

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl From<ArchiveError> for InstallError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Cancelled => Self::Cancelled,
            ArchiveError::Io(e) => Self::Io(e),
            other => Self::Archive(other),
        }
    }
}
