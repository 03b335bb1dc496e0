//! The in-archive `package.toml` metadata file.
//!
//! ```toml
//! [package]
//! id = "Contoso.Utils.fr"
//! version = "1.0.0"
//! language = "fr"
//!
//! [[framework-assembly]]
//! name = "System.Net"
//! target-framework = "net45"
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AssetGroup, Framework, PackageId, PackageIdentity, PackageVersion};

/// Errors raised while reading `package.toml`.
#[derive(Error, Debug)]
pub enum SpecError {
    /// The bytes are not UTF-8.
    #[error("package.toml is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// The TOML does not match the expected schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level structure of `package.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    /// The `[package]` table.
    pub package: PackageMetadata,
    /// Assemblies the package expects the framework to provide.
    #[serde(default, rename = "framework-assembly")]
    pub framework_assemblies: Vec<FrameworkAssembly>,
}

/// The `[package]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Package id.
    pub id: PackageId,
    /// Package version.
    pub version: PackageVersion,
    /// Culture of a satellite (localized resource) package, e.g. `fr`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A `[[framework-assembly]]` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrameworkAssembly {
    /// Assembly name, with or without extension.
    pub name: String,
    /// Framework the reference applies to; every framework when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<Framework>,
}

impl PackageSpec {
    /// Parse `package.toml` content.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Parse`] if the TOML is invalid or the id or
    /// version do not parse.
    pub fn parse(content: &str) -> Result<Self, SpecError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse raw `package.toml` bytes as read from an archive.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Encoding`] for non-UTF-8 input, otherwise as
    /// [`PackageSpec::parse`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SpecError> {
        Self::parse(std::str::from_utf8(bytes)?)
    }

    /// Serialize to pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns a `toml::ser::Error` if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// The declared identity.
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.package.id.clone(), self.package.version.clone())
    }

    /// The satellite language, when this is a satellite package.
    ///
    /// A package is a satellite package when it declares a language and its
    /// id ends with `.{language}`.
    pub fn satellite_language(&self) -> Option<&str> {
        let language = self.package.language.as_deref()?.trim();
        if language.is_empty() {
            return None;
        }
        self.package
            .id
            .ends_with_ignore_case(&format!(".{language}"))
            .then_some(language)
    }

    /// Identity of the runtime package a satellite package localizes.
    pub fn satellite_runtime_identity(&self) -> Option<PackageIdentity> {
        let language = self.satellite_language()?;
        let id = self.package.id.as_str();
        let runtime = &id[..id.len() - language.len() - 1];
        PackageId::new(runtime)
            .ok()
            .map(|id| PackageIdentity::new(id, self.package.version.clone()))
    }

    /// Framework-reference asset groups, one per distinct framework in
    /// declaration order.
    pub fn framework_reference_groups(&self) -> Vec<AssetGroup> {
        let mut groups: Vec<AssetGroup> = Vec::new();
        for assembly in &self.framework_assemblies {
            let framework = assembly.target_framework.clone().unwrap_or(Framework::Any);
            let item = assembly.file_name();
            match groups.iter_mut().find(|g| *g.framework() == framework) {
                Some(group) => group.push(item),
                None => groups.push(AssetGroup::new(framework, vec![item])),
            }
        }
        groups
    }
}

impl FrameworkAssembly {
    /// File name of the assembly; names without an assembly extension get
    /// `.dll`.
    pub fn file_name(&self) -> String {
        let name = self.name.trim();
        let lower = name.to_ascii_lowercase();
        if crate::ASSEMBLY_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(ext))
        {
            name.to_string()
        } else {
            format!("{name}.dll")
        }
    }
}
