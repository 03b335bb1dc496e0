//! Target framework identifiers.
//!
//! A framework is a family (`.NETFramework`, `Silverlight`, ...), a version
//! and an optional profile. Packages name them with short folder names
//! (`net45`, `net40-client`, `sl5`, `netstandard2.0`); projects may also use
//! the long form (`.NETFramework,Version=v4.5,Profile=Client`).
//!
//! ```
//! use pakt_schema::Framework;
//!
//! let fw = Framework::parse("net40-client");
//! assert_eq!(fw.to_string(), "net40-client");
//! assert_eq!(Framework::parse(".NETFramework,Version=v4.0,Profile=Client"), fw);
//! assert_eq!(Framework::parse(""), Framework::Any);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical family name for the desktop .NET Framework.
pub const NET_FRAMEWORK: &str = ".NETFramework";
/// Canonical family name for Windows Store (.NETCore) apps.
pub const NET_CORE: &str = ".NETCore";
/// Canonical family name for Silverlight.
pub const SILVERLIGHT: &str = "Silverlight";
/// Canonical family name for Windows Phone.
pub const WINDOWS_PHONE: &str = "WindowsPhone";
/// Canonical family name for .NET Standard.
pub const NET_STANDARD: &str = ".NETStandard";
/// Canonical family name for .NET Core applications.
pub const NET_CORE_APP: &str = ".NETCoreApp";
/// Canonical family name for native (C++) assets.
pub const NATIVE: &str = "native";

/// (short name, canonical family, version is written with dots)
const FAMILIES: &[(&str, &str, bool)] = &[
    ("net", NET_FRAMEWORK, false),
    ("netcore", NET_CORE, false),
    ("sl", SILVERLIGHT, false),
    ("wp", WINDOWS_PHONE, false),
    ("netstandard", NET_STANDARD, true),
    ("netcoreapp", NET_CORE_APP, true),
    ("native", NATIVE, false),
];

/// Short and long identifiers that name a family under another spelling.
const ALIASES: &[(&str, &str)] = &[
    (".netframework", NET_FRAMEWORK),
    ("netframework", NET_FRAMEWORK),
    (".netcore", NET_CORE),
    ("silverlight", SILVERLIGHT),
    ("windowsphone", WINDOWS_PHONE),
    (".netstandard", NET_STANDARD),
    (".netcoreapp", NET_CORE_APP),
];

/// A four-part framework version (`4.5` is `4.5.0.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FrameworkVersion([u32; 4]);

impl FrameworkVersion {
    /// Construct from explicit parts.
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self([major, minor, build, revision])
    }

    /// Parse either dotted (`4.5.1`) or compact (`451`) notation.
    fn parse(s: &str) -> Option<Self> {
        let mut parts = [0u32; 4];
        if s.is_empty() {
            return Some(Self(parts));
        }
        if s.contains('.') {
            let split: Vec<&str> = s.split('.').collect();
            if split.len() > 4 {
                return None;
            }
            for (slot, part) in parts.iter_mut().zip(split) {
                *slot = part.parse().ok()?;
            }
        } else {
            if s.len() > 4 || !s.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            for (slot, digit) in parts.iter_mut().zip(s.chars()) {
                *slot = digit.to_digit(10)?;
            }
        }
        Some(Self(parts))
    }

    /// Number of parts worth printing (at least two).
    fn significant_parts(self) -> usize {
        let last_nonzero = self.0.iter().rposition(|p| *p != 0).unwrap_or(0);
        (last_nonzero + 1).max(2)
    }

    fn dotted(self) -> String {
        self.0[..self.significant_parts()]
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    fn compact(self) -> Option<String> {
        let parts = &self.0[..self.significant_parts()];
        if parts.iter().any(|p| *p > 9) {
            return None;
        }
        Some(parts.iter().map(u32::to_string).collect())
    }
}

impl std::fmt::Display for FrameworkVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// A concrete framework: family, version and (lowercase) profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameworkName {
    family: &'static str,
    version: FrameworkVersion,
    profile: Option<String>,
}

impl FrameworkName {
    /// Build a framework name from a known family identifier.
    ///
    /// Returns `None` if the family is not recognised.
    pub fn new(family: &str, version: FrameworkVersion, profile: Option<&str>) -> Option<Self> {
        Some(Self {
            family: canonical_family(family)?,
            version,
            profile: profile
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_ascii_lowercase),
        })
    }

    /// Canonical family name (e.g. `.NETFramework`).
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Framework version.
    pub fn version(&self) -> FrameworkVersion {
        self.version
    }

    /// Lowercase profile name, if any.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Short folder name (`net45`, `net40-client`, `netstandard2.0`).
    pub fn short_folder_name(&self) -> String {
        let (short, dotted) = FAMILIES
            .iter()
            .find(|(_, family, _)| *family == self.family)
            .map_or((self.family, true), |(short, _, dotted)| (*short, *dotted));

        let version = if dotted {
            self.version.dotted()
        } else {
            self.version
                .compact()
                .unwrap_or_else(|| self.version.dotted())
        };

        match &self.profile {
            Some(profile) => format!("{short}{version}-{profile}"),
            None => format!("{short}{version}"),
        }
    }
}

/// A target framework as used by asset groups and projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Framework {
    /// Applies to every framework (`lib/A.dll`, `any`).
    Any,
    /// A concrete framework.
    Specific(FrameworkName),
    /// An identifier that could not be understood; compatible with nothing.
    Unsupported(String),
}

impl Framework {
    /// Parse a short folder name or long framework name.
    ///
    /// Never fails: unknown identifiers become [`Framework::Unsupported`].
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            return Self::Any;
        }

        let parsed = if trimmed.contains(',') || trimmed.starts_with('.') {
            parse_long(trimmed)
        } else {
            parse_short(trimmed)
        };

        parsed.map_or_else(|| Self::Unsupported(trimmed.to_string()), Self::Specific)
    }

    /// Shorthand for a framework without a profile.
    ///
    /// Returns `None` for unknown families.
    pub fn specific(family: &str, version: FrameworkVersion) -> Option<Self> {
        FrameworkName::new(family, version, None).map(Self::Specific)
    }

    /// Returns `true` for [`Framework::Any`].
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns `true` for [`Framework::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// The concrete name, when there is one.
    pub fn name(&self) -> Option<&FrameworkName> {
        match self {
            Self::Specific(name) => Some(name),
            Self::Any | Self::Unsupported(_) => None,
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Specific(name) => write!(f, "{}", name.short_folder_name()),
            Self::Unsupported(raw) => write!(f, "{raw}"),
        }
    }
}

impl std::str::FromStr for Framework {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for Framework {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Framework {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

fn canonical_family(identifier: &str) -> Option<&'static str> {
    let lower = identifier.to_ascii_lowercase();
    FAMILIES
        .iter()
        .find(|(short, family, _)| *short == lower || family.eq_ignore_ascii_case(&lower))
        .map(|(_, family, _)| *family)
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == lower)
                .map(|(_, family)| *family)
        })
}

fn parse_short(s: &str) -> Option<FrameworkName> {
    let (body, profile) = match s.split_once('-') {
        Some((body, profile)) => (body, Some(profile)),
        None => (s, None),
    };

    let split = body
        .find(|c: char| c.is_ascii_digit() || c == '.')
        .unwrap_or(body.len());
    let (identifier, version) = body.split_at(split);
    let identifier = identifier.to_ascii_lowercase();

    // Windows 8 store apps predate the `netcore` spelling.
    if identifier == "win" || identifier == "windows" {
        let version = match version {
            "" => FrameworkVersion::default(),
            "8" | "8.0" => FrameworkVersion::new(4, 5, 0, 0),
            "81" | "8.1" => FrameworkVersion::new(4, 5, 1, 0),
            _ => return None,
        };
        return FrameworkName::new(NET_CORE, version, profile);
    }

    FrameworkName::new(&identifier, FrameworkVersion::parse(version)?, profile)
}

fn parse_long(s: &str) -> Option<FrameworkName> {
    let mut parts = s.split(',').map(str::trim);
    let family = parts.next()?;
    let mut version = FrameworkVersion::default();
    let mut profile = None;

    for part in parts {
        let (key, value) = part.split_once('=')?;
        match key.trim().to_ascii_lowercase().as_str() {
            "version" => {
                let value = value.trim();
                let value = value
                    .strip_prefix('v')
                    .or_else(|| value.strip_prefix('V'))
                    .unwrap_or(value);
                if !value.contains('.') {
                    return None;
                }
                version = FrameworkVersion::parse(value)?;
            }
            "profile" => profile = Some(value.trim()),
            _ => return None,
        }
    }

    FrameworkName::new(family, version, profile)
}
