//! Shared types and wire formats for pakt packages.
//!
//! Everything in this crate is pure data: package identities, target
//! frameworks, asset groups, the content/signature manifests and the
//! in-archive `package.toml`. Filesystem and archive I/O live in `pakt-core`.

pub mod content;
pub mod framework;
pub mod group;
pub mod hash;
pub mod identity;
pub mod signature;
pub mod spec;

// Re-exports
pub use content::{ContentManifest, FormatError, HashValue, ManifestEntry};
pub use framework::{Framework, FrameworkName, FrameworkVersion};
pub use group::{AssetGroup, AssetKind};
pub use hash::{Digest, HashAlgorithm, Hasher};
pub use identity::{IdentityError, PackageId, PackageIdentity, PackageVersion};
pub use signature::{Signature, SignatureManifest};
pub use spec::{FrameworkAssembly, PackageMetadata, PackageSpec, SpecError};

/// Root directory for library assets inside a package.
pub const LIB_DIR: &str = "lib";

/// Root directory for content files inside a package.
pub const CONTENT_DIR: &str = "content";

/// Root directory for build files (props/targets) inside a package.
pub const BUILD_DIR: &str = "build";

/// File name used to mark an asset folder as intentionally empty.
pub const EMPTY_FOLDER_MARKER: &str = "_._";

/// Extensions accepted as build-system assembly references.
pub const ASSEMBLY_EXTENSIONS: &[&str] = &[".dll", ".exe", ".winmd"];

/// Suffix of localized resource assemblies, never referenced directly.
pub const RESOURCE_ASSEMBLY_SUFFIX: &str = ".resources.dll";

/// Extension of the canonical package archive.
pub const PACKAGE_EXTENSION: &str = ".pakt";

/// Package metadata file at the archive root.
pub const PACKAGE_SPEC_FILE: &str = "package.toml";

/// Archive path of the content manifest written by the signer.
pub const MANIFEST_PATH: &str = ".signature/manifest.json";

/// Archive path of the primary signature written by the signer.
pub const SIGNATURE_PATH: &str = ".signature/signature.sig";

/// Every archive path reserved for signing artifacts.
pub const SIGNING_PATHS: &[&str] = &[MANIFEST_PATH, SIGNATURE_PATH];

/// Returns `true` if `path` is one of the reserved signing paths.
///
/// Comparison is ASCII case-insensitive and tolerant of `\` separators.
///
/// # Example
///
/// ```
/// use pakt_schema::is_signing_path;
///
/// assert!(is_signing_path(".signature/manifest.json"));
/// assert!(is_signing_path(".SIGNATURE\\Signature.sig"));
/// assert!(!is_signing_path("lib/net45/A.dll"));
/// ```
pub fn is_signing_path(path: &str) -> bool {
    let normalized = normalize_entry_path(path);
    SIGNING_PATHS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(&normalized))
}

/// Normalize an archive entry path: forward slashes, no leading separator.
pub fn normalize_entry_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}
