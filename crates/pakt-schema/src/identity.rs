//! Package identity newtypes.
//!
//! Ids keep the casing the author published them with but compare
//! case-insensitively. Versions accept one to four numeric parts plus an
//! optional prerelease tag and order like semver, with the fourth
//! (revision) part ranked after patch.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors raised while parsing identity components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The package id is empty or contains path separators.
    #[error("Invalid package id: '{0}'")]
    InvalidId(String),

    /// The version string could not be parsed.
    #[error("Invalid package version: '{0}'")]
    InvalidVersion(String),
}

/// A package id. Case is preserved for display, ignored for comparison.
#[derive(Debug, Clone)]
pub struct PackageId(String);

impl PackageId {
    /// Create a validated package id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidId`] if `id` is blank or contains
    /// `/`, `\` or whitespace.
    pub fn new(id: &str) -> Result<Self, IdentityError> {
        let id = id.trim();
        if id.is_empty() || id.contains(['/', '\\']) || id.contains(char::is_whitespace) {
            return Err(IdentityError::InvalidId(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    /// Return the id as published.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive suffix check, used for satellite package detection.
    pub fn ends_with_ignore_case(&self, suffix: &str) -> bool {
        self.0.len() > suffix.len()
            && self.0.is_char_boundary(self.0.len() - suffix.len())
            && self.0[self.0.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for PackageId {}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(other.0.bytes().map(|b| b.to_ascii_lowercase()))
    }
}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PackageId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for PackageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PackageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A package version: `major[.minor[.patch[.revision]]][-prerelease][+build]`.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    version: semver::Version,
    revision: u64,
}

impl PackageVersion {
    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidVersion`] if there are zero or more
    /// than four numeric parts, a part is not a number, or the prerelease
    /// tag is malformed.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let invalid = || IdentityError::InvalidVersion(s.to_string());
        let s_trimmed = s.trim();

        let (core, rest) = match s_trimmed.find(['-', '+']) {
            Some(idx) => (&s_trimmed[..idx], &s_trimmed[idx..]),
            None => (s_trimmed, ""),
        };

        let parts = core
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }

        let part = |i: usize| parts.get(i).copied().unwrap_or(0);
        let normalized = format!("{}.{}.{}{rest}", part(0), part(1), part(2));
        let version = semver::Version::parse(&normalized).map_err(|_| invalid())?;

        Ok(Self {
            version,
            revision: part(3),
        })
    }

    /// Major component.
    pub fn major(&self) -> u64 {
        self.version.major
    }

    /// Minor component.
    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    /// Patch component.
    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    /// Fourth (revision) component, zero when absent.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns `true` if the version carries a prerelease tag.
    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.major.hash(state);
        self.version.minor.hash(state);
        self.version.patch.hash(state);
        self.revision.hash(state);
        self.version.pre.as_str().to_ascii_lowercase().hash(state);
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.version.major, self.version.minor, self.version.patch, self.revision)
            .cmp(&(
                other.version.major,
                other.version.minor,
                other.version.patch,
                other.revision,
            ))
            .then_with(|| {
                // Prerelease labels compare case-insensitively.
                let a = semver::Prerelease::new(&self.version.pre.as_str().to_ascii_lowercase());
                let b = semver::Prerelease::new(&other.version.pre.as_str().to_ascii_lowercase());
                match (a, b) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    _ => self.version.pre.cmp(&other.version.pre),
                }
            })
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.version.major, self.version.minor, self.version.patch
        )?;
        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !self.version.pre.is_empty() {
            write!(f, "-{}", self.version.pre)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for PackageVersion {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A package's identity: id plus version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// The package id.
    pub id: PackageId,
    /// The exact package version.
    pub version: PackageVersion,
}

impl PackageIdentity {
    /// Create an identity from already-validated parts.
    pub fn new(id: PackageId, version: PackageVersion) -> Self {
        Self { id, version }
    }

    /// Parse an identity from raw strings.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if either part is invalid.
    pub fn parse(id: &str, version: &str) -> Result<Self, IdentityError> {
        Ok(Self::new(PackageId::new(id)?, PackageVersion::parse(version)?))
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}
