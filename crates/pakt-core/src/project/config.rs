//! Project configuration (`pakt-project.toml`).
//!
//! ```toml
//! name = "Contoso.App"
//! target-framework = "net46"
//! packages-dir = "packages"
//! reference-list = "packages.toml"
//! save-mode = "files-and-archive"   # optional
//! copy-satellite-files = true       # optional
//! ```
//!
//! Relative paths resolve against the directory holding the file.

use std::path::{Path, PathBuf};

use pakt_schema::Framework;
use serde::Deserialize;
use thiserror::Error;

use crate::extract::{ExtractionOptions, PackageSaveMode};
use crate::paths::PackagePathResolver;

/// Conventional file name of a project configuration.
pub const PROJECT_CONFIG_FILE: &str = "pakt-project.toml";

/// Errors raised while loading a [`ProjectConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read project config: {0}")]
    Io(#[from] std::io::Error),

    /// Not TOML, an unknown key, or a missing required key.
    #[error("Failed to parse project config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed but unusable.
    #[error("Invalid project config: {0}")]
    Invalid(String),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawProjectConfig {
    name: String,
    target_framework: String,
    packages_dir: PathBuf,
    reference_list: PathBuf,
    #[serde(default)]
    save_mode: Option<PackageSaveMode>,
    #[serde(default = "default_copy_satellite_files")]
    copy_satellite_files: bool,
}

fn default_copy_satellite_files() -> bool {
    true
}

/// Validated settings of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Display name.
    pub name: String,
    /// Framework the project compiles against. Never `Any` or unsupported.
    pub target_framework: Framework,
    /// Root under which packages are extracted.
    pub packages_dir: PathBuf,
    /// Location of the installed-package list.
    pub reference_list: PathBuf,
    /// Which artifacts extraction writes.
    pub save_mode: PackageSaveMode,
    /// Propagate satellite resources into runtime packages.
    pub copy_satellite_files: bool,
}

impl ProjectConfig {
    /// Build a configuration in code.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty name or a framework
    /// that is `Any` or unsupported.
    pub fn new(
        name: impl Into<String>,
        target_framework: Framework,
        packages_dir: impl Into<PathBuf>,
        reference_list: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            name: name.into(),
            target_framework,
            packages_dir: packages_dir.into(),
            reference_list: reference_list.into(),
            save_mode: PackageSaveMode::default(),
            copy_satellite_files: true,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`ProjectConfig::parse`].
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base)
    }

    /// Parse and validate configuration text; relative paths are joined to
    /// `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, unknown keys or
    /// missing keys, and [`ConfigError::Invalid`] for values that parse but
    /// cannot be used.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let raw: RawProjectConfig = toml::from_str(content)?;
        let config = Self {
            name: raw.name,
            target_framework: Framework::parse(&raw.target_framework),
            packages_dir: base_dir.join(raw.packages_dir),
            reference_list: base_dir.join(raw.reference_list),
            save_mode: raw.save_mode.unwrap_or_default(),
            copy_satellite_files: raw.copy_satellite_files,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if self.target_framework.name().is_none() {
            return Err(ConfigError::Invalid(format!(
                "unsupported target framework '{}'",
                self.target_framework
            )));
        }
        Ok(())
    }

    /// Install layout under [`ProjectConfig::packages_dir`].
    pub fn path_resolver(&self) -> PackagePathResolver {
        PackagePathResolver::new(&self.packages_dir)
    }

    /// Extraction options, honouring a per-operation save mode override.
    pub fn extraction_options(&self, save_mode: Option<PackageSaveMode>) -> ExtractionOptions {
        ExtractionOptions {
            save_mode: save_mode.unwrap_or(self.save_mode),
            copy_satellite_files: self.copy_satellite_files,
        }
    }
}
