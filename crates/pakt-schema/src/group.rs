//! Framework-scoped asset groups.

use crate::Framework;

/// The kinds of assets a package can carry per framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Library binaries under `lib/`.
    Lib,
    /// Assemblies supplied by the framework itself, declared in `package.toml`.
    FrameworkReference,
    /// Project content files under `content/`.
    Content,
    /// Build integration files under `build/`.
    Build,
}

impl AssetKind {
    /// All kinds, in the order the installer resolves them.
    pub const ALL: [Self; 4] = [
        Self::Lib,
        Self::FrameworkReference,
        Self::Content,
        Self::Build,
    ];

    /// Archive root directory for file-backed kinds.
    pub fn root_dir(self) -> Option<&'static str> {
        match self {
            Self::Lib => Some(crate::LIB_DIR),
            Self::Content => Some(crate::CONTENT_DIR),
            Self::Build => Some(crate::BUILD_DIR),
            Self::FrameworkReference => None,
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lib => "lib",
            Self::FrameworkReference => "framework-reference",
            Self::Content => "content",
            Self::Build => "build",
        };
        write!(f, "{s}")
    }
}

/// One flavor of an asset kind, scoped to a target framework.
///
/// An empty `items` list is meaningful: the package explicitly has nothing of
/// this kind for `framework`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetGroup {
    framework: Framework,
    items: Vec<String>,
}

impl AssetGroup {
    /// Create a group from a framework and its item paths.
    pub fn new(framework: Framework, items: Vec<String>) -> Self {
        Self { framework, items }
    }

    /// The framework this group targets.
    pub fn framework(&self) -> &Framework {
        &self.framework
    }

    /// Archive-relative item paths, in archive order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Returns `true` if the group has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push(&mut self, item: String) {
        self.items.push(item);
    }
}
