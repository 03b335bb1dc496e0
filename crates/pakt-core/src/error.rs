//! Crate-wide error type.
//!
//! Each layer keeps its own error enum; [`Error`] wraps them for callers
//! that drive several layers and only need to branch on [`ErrorKind`].

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::extract::ExtractError;
use crate::project::{ConfigError, InstallError};
use crate::references::ReferenceListError;
use crate::signing::{ProviderError, SignError, VerifyError};

/// Any error raised by this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Archive layer.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Extraction layer.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Signing.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// Verification.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Reference list.
    #[error(transparent)]
    References(#[from] ReferenceListError),

    /// Install orchestration.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Project configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required input is missing or invalid; raised before any I/O.
    InvalidArgument,
    /// A stream lacks random access.
    NotSeekable,
    /// No asset group applies to the project's framework.
    IncompatiblePackage,
    /// Stored content fails to parse or has an unsupported version.
    Format,
    /// The signature provider refused, or a signature does not verify.
    Provider,
    /// Underlying storage failure.
    Io,
    /// A step with no implementation.
    NotImplemented,
    /// Cooperative cancellation.
    Cancelled,
    /// The zip container is unreadable or inconsistent.
    Archive,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Archive(e) => archive_kind(e),
            Self::Extract(e) => extract_kind(e),
            Self::Sign(e) => match e {
                SignError::InvalidRequest(_) => ErrorKind::InvalidArgument,
                SignError::Provider(_) => ErrorKind::Provider,
                SignError::Archive(e) => archive_kind(e),
                SignError::Io(_) | SignError::PackageUnavailable(_) => ErrorKind::Io,
                SignError::Cancelled => ErrorKind::Cancelled,
            },
            Self::Verify(e) => match e {
                VerifyError::Unsigned | VerifyError::SignatureInvalid => ErrorKind::Provider,
                VerifyError::MissingManifest
                | VerifyError::Format(_)
                | VerifyError::ContentMismatch(_) => ErrorKind::Format,
                VerifyError::Archive(e) => archive_kind(e),
                VerifyError::Cancelled => ErrorKind::Cancelled,
            },
            Self::References(e) => match e {
                ReferenceListError::Io(_) => ErrorKind::Io,
                ReferenceListError::Format { .. } | ReferenceListError::Serialize(_) => {
                    ErrorKind::Format
                }
            },
            Self::Install(e) => match e {
                InstallError::IncompatiblePackage { .. } => ErrorKind::IncompatiblePackage,
                InstallError::NotImplemented(_) => ErrorKind::NotImplemented,
                InstallError::Extract(e) => extract_kind(e),
                InstallError::References(ReferenceListError::Io(_)) | InstallError::Io(_) => {
                    ErrorKind::Io
                }
                InstallError::References(_) => ErrorKind::Format,
                InstallError::Archive(e) => archive_kind(e),
                InstallError::Cancelled => ErrorKind::Cancelled,
                InstallError::ProjectSystem(_) | InstallError::Other(_) => ErrorKind::Io,
            },
            Self::Config(e) => match e {
                ConfigError::Io(_) => ErrorKind::Io,
                ConfigError::Parse(_) | ConfigError::Invalid(_) => ErrorKind::InvalidArgument,
            },
        }
    }

    /// Returns `true` for cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Self::Sign(SignError::Provider(err))
    }
}

fn extract_kind(e: &ExtractError) -> ErrorKind {
    match e {
        ExtractError::NotSeekable => ErrorKind::NotSeekable,
        ExtractError::Io(_) => ErrorKind::Io,
        ExtractError::Archive(e) => archive_kind(e),
        ExtractError::InvalidPath(_) => ErrorKind::Archive,
        ExtractError::Cancelled => ErrorKind::Cancelled,
    }
}

fn archive_kind(e: &ArchiveError) -> ErrorKind {
    match e {
        ArchiveError::Io(_) => ErrorKind::Io,
        ArchiveError::Zip(_) | ArchiveError::EntryExists(_) => ErrorKind::Archive,
        ArchiveError::Spec(_) => ErrorKind::Format,
        ArchiveError::Cancelled => ErrorKind::Cancelled,
    }
}
