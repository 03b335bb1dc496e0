//! Project-level install and uninstall.
//!
//! [`ProjectInstaller`] composes the resolver, extractor and reference list
//! against a [`ProjectSystem`] adapter for the underlying build tool.

mod config;
mod error;
mod installer;
mod system;

pub use config::{ConfigError, PROJECT_CONFIG_FILE, ProjectConfig};
pub use error::InstallError;
pub use installer::ProjectInstaller;
pub use system::{InstallContext, ProjectSystem};

use std::path::PathBuf;

/// What an install did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The package was extracted and referenced.
    Installed(InstallSummary),
    /// The package was already in the reference list; nothing was written.
    AlreadyInstalled,
}

/// Details of a completed install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    /// Paths handed to [`ProjectSystem::add_reference`], in call order.
    pub references: Vec<PathBuf>,
    /// Files written under the packages folder.
    pub files: Vec<PathBuf>,
}

/// What an uninstall did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum UninstallOutcome {
    /// The package was not in the reference list; nothing was touched.
    NotInstalled,
}
