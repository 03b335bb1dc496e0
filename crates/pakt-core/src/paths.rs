//! Package folder layout.

use std::path::{Path, PathBuf};

use pakt_schema::{PACKAGE_EXTENSION, PackageIdentity};

/// Maps package identities to directories under a packages root.
///
/// With side-by-side paths (the default) each version gets its own
/// directory: `<root>/<id>.<version>`. Without, the version is dropped.
#[derive(Debug, Clone)]
pub struct PackagePathResolver {
    root: PathBuf,
    side_by_side: bool,
}

impl PackagePathResolver {
    /// Resolver with side-by-side version directories.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            side_by_side: true,
        }
    }

    /// Toggle side-by-side version directories.
    pub fn with_side_by_side(mut self, side_by_side: bool) -> Self {
        self.side_by_side = side_by_side;
        self
    }

    /// Packages root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name for a package: `<id>.<version>` or `<id>`.
    pub fn directory_name(&self, identity: &PackageIdentity) -> String {
        if self.side_by_side {
            format!("{}.{}", identity.id, identity.version)
        } else {
            identity.id.to_string()
        }
    }

    /// Absolute install directory for a package.
    pub fn install_path(&self, identity: &PackageIdentity) -> PathBuf {
        self.root.join(self.directory_name(identity))
    }

    /// File name of the canonical archive copy: `<id>.<version>.pakt`.
    pub fn package_file_name(&self, identity: &PackageIdentity) -> String {
        format!("{}.{}{PACKAGE_EXTENSION}", identity.id, identity.version)
    }

    /// Absolute path of the canonical archive copy.
    pub fn package_file_path(&self, identity: &PackageIdentity) -> PathBuf {
        self.install_path(identity)
            .join(self.package_file_name(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_by_side_layout() {
        let resolver = PackagePathResolver::new("/p");
        let identity = PackageIdentity::parse("Contoso.Utils", "1.0").unwrap();
        assert_eq!(
            resolver.install_path(&identity),
            Path::new("/p/Contoso.Utils.1.0.0")
        );
        assert_eq!(
            resolver.package_file_path(&identity),
            Path::new("/p/Contoso.Utils.1.0.0/Contoso.Utils.1.0.0.pakt")
        );
    }

    #[test]
    fn flat_layout_drops_version_from_directory() {
        let resolver = PackagePathResolver::new("/p").with_side_by_side(false);
        let identity = PackageIdentity::parse("A", "2.1.0").unwrap();
        assert_eq!(resolver.install_path(&identity), Path::new("/p/A"));
        assert_eq!(resolver.package_file_name(&identity), "A.2.1.0.pakt");
    }
}
