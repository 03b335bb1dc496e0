//! The project's installed-package list.
//!
//! Stored as human-diffable TOML next to the project:
//!
//! ```toml
//! version = 1
//!
//! [[package]]
//! id = "A"
//! version = "1.0.0"
//! target-framework = "net46"
//! ```
//!
//! Every successful mutation rewrites the whole file. Not safe for
//! concurrent writers; callers serialize access per project.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pakt_schema::{Framework, PackageId, PackageIdentity, PackageVersion};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Current reference list format version.
pub const REFERENCE_LIST_VERSION: u32 = 1;

/// Errors raised while reading or writing the reference list.
#[derive(Error, Debug)]
pub enum ReferenceListError {
    /// Underlying storage failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file does not parse, or has an unsupported version.
    #[error("Invalid reference list {path}: {message}")]
    Format {
        /// File that failed to parse.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },

    /// The list could not be serialized.
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// One installed package, recorded with the framework it was installed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    /// Installed package.
    pub identity: PackageIdentity,
    /// Project framework at install time.
    pub target_framework: Framework,
}

impl PackageReference {
    /// Create a reference.
    pub fn new(identity: PackageIdentity, target_framework: Framework) -> Self {
        Self {
            identity,
            target_framework,
        }
    }
}

/// Result of [`ReferenceListStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The reference was appended and the file rewritten.
    Added,
    /// A reference with this identity already exists; nothing was written.
    AlreadyExists,
}

/// Result of [`ReferenceListStore::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The reference was removed and the file rewritten.
    Removed,
    /// No reference with this identity; nothing was written.
    NotFound,
}

/// The in-memory list at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSnapshot {
    generation: u64,
    references: Vec<PackageReference>,
}

impl ReferenceSnapshot {
    /// Number of successful mutations made through this store.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// References in insertion order.
    pub fn references(&self) -> &[PackageReference] {
        &self.references
    }

    /// Look up a reference by identity.
    pub fn get(&self, identity: &PackageIdentity) -> Option<&PackageReference> {
        self.references.iter().find(|r| r.identity == *identity)
    }

    /// Returns `true` if `identity` is recorded.
    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.get(identity).is_some()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReferenceRecord {
    id: PackageId,
    version: PackageVersion,
    target_framework: Framework,
}

#[derive(Serialize, Deserialize)]
struct ReferenceDocument {
    version: Option<u32>,
    #[serde(default, rename = "package", skip_serializing_if = "Vec::is_empty")]
    packages: Vec<ReferenceRecord>,
}

/// Lazily loaded, write-through store for one reference list file.
#[derive(Debug)]
pub struct ReferenceListStore {
    path: PathBuf,
    generation: u64,
    snapshot: Option<ReferenceSnapshot>,
}

impl ReferenceListStore {
    /// Store for `path`. Performs no I/O.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            generation: 0,
            snapshot: None,
        }
    }

    /// File location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// References, reading the file on first use. A missing file is an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceListError::Format`] if the file does not parse or
    /// has an unsupported version.
    pub fn load(&mut self) -> Result<&[PackageReference], ReferenceListError> {
        Ok(&self.snapshot()?.references)
    }

    /// Drop the cached list and read the file again.
    ///
    /// # Errors
    ///
    /// As [`ReferenceListStore::load`].
    pub fn reload(&mut self) -> Result<&[PackageReference], ReferenceListError> {
        self.snapshot = None;
        self.load()
    }

    /// The cached snapshot, reading the file on first use.
    ///
    /// # Errors
    ///
    /// As [`ReferenceListStore::load`].
    pub fn snapshot(&mut self) -> Result<&ReferenceSnapshot, ReferenceListError> {
        let snapshot = match self.snapshot.take() {
            Some(snapshot) => snapshot,
            None => ReferenceSnapshot {
                generation: self.generation,
                references: read_references(&self.path)?,
            },
        };
        Ok(self.snapshot.insert(snapshot))
    }

    /// Append a reference and rewrite the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be loaded or written. A duplicate
    /// identity is not an error; it yields [`AddOutcome::AlreadyExists`].
    pub fn add(&mut self, reference: PackageReference) -> Result<AddOutcome, ReferenceListError> {
        let current = self.load()?;
        if current.iter().any(|r| r.identity == reference.identity) {
            warn!(package = %reference.identity, "reference already exists");
            return Ok(AddOutcome::AlreadyExists);
        }

        let mut next = current.to_vec();
        debug!(package = %reference.identity, framework = %reference.target_framework, "adding reference");
        next.push(reference);
        self.commit(next)?;
        Ok(AddOutcome::Added)
    }

    /// Remove a reference and rewrite the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be loaded or written. A missing
    /// identity is not an error; it yields [`RemoveOutcome::NotFound`].
    pub fn remove(&mut self, identity: &PackageIdentity) -> Result<RemoveOutcome, ReferenceListError> {
        let current = self.load()?;
        let Some(position) = current.iter().position(|r| r.identity == *identity) else {
            warn!(package = %identity, "reference not found");
            return Ok(RemoveOutcome::NotFound);
        };

        let mut next = current.to_vec();
        next.remove(position);
        debug!(package = %identity, "removing reference");
        self.commit(next)?;
        Ok(RemoveOutcome::Removed)
    }

    fn commit(&mut self, references: Vec<PackageReference>) -> Result<(), ReferenceListError> {
        write_references(&self.path, &references)?;
        self.generation += 1;
        self.snapshot = Some(ReferenceSnapshot {
            generation: self.generation,
            references,
        });
        Ok(())
    }
}

fn read_references(path: &Path) -> Result<Vec<PackageReference>, ReferenceListError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let format_error = |message: String| ReferenceListError::Format {
        path: path.to_path_buf(),
        message,
    };

    let document: ReferenceDocument =
        toml::from_str(&content).map_err(|e| format_error(e.to_string()))?;
    match document.version {
        Some(REFERENCE_LIST_VERSION) => {}
        Some(other) => return Err(format_error(format!("unsupported version {other}"))),
        None => return Err(format_error("missing version".to_string())),
    }

    let mut references: Vec<PackageReference> = Vec::with_capacity(document.packages.len());
    for record in document.packages {
        let identity = PackageIdentity::new(record.id, record.version);
        if references.iter().any(|r| r.identity == identity) {
            return Err(format_error(format!("duplicate reference {identity}")));
        }
        references.push(PackageReference::new(identity, record.target_framework));
    }
    Ok(references)
}

fn write_references(path: &Path, references: &[PackageReference]) -> Result<(), ReferenceListError> {
    let document = ReferenceDocument {
        version: Some(REFERENCE_LIST_VERSION),
        packages: references
            .iter()
            .map(|r| ReferenceRecord {
                id: r.identity.id.clone(),
                version: r.identity.version.clone(),
                target_framework: r.target_framework.clone(),
            })
            .collect(),
    };
    let content = toml::to_string_pretty(&document)?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
