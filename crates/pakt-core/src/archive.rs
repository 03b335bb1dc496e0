//! Package archive access.
//!
//! [`PackageReader`] reads asset groups, metadata and content manifests out
//! of any seekable zip stream. [`ZipPackage`] is a file-backed package that
//! can also be edited, which is what the signer needs.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use pakt_schema::{
    AssetGroup, AssetKind, ContentManifest, Framework, HashAlgorithm, ManifestEntry,
    PACKAGE_SPEC_FILE, PackageSpec, SpecError, is_signing_path, normalize_entry_path,
};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::signing::SignedPackage;

/// Errors raised while reading or editing a package archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Underlying storage failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The zip container is invalid.
    #[error("Archive error: {0}")]
    Zip(#[from] ZipError),

    /// `package.toml` is present but invalid.
    #[error("Invalid {PACKAGE_SPEC_FILE}: {0}")]
    Spec(#[from] SpecError),

    /// An entry with this path is already in the archive.
    #[error("Entry already exists: {0}")]
    EntryExists(String),

    /// The operation was cancelled between entries.
    #[error("Operation cancelled")]
    Cancelled,
}

/// One central-directory record.
#[derive(Debug, Clone)]
struct RawEntry {
    index: usize,
    path: String,
    is_dir: bool,
}

/// Read-only view of a package archive.
#[derive(Debug)]
pub struct PackageReader<R> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> PackageReader<R> {
    /// Open a zip stream. Reads the central directory; entry bodies are read
    /// on demand.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Zip`] if the stream is not a zip archive.
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }

    /// Number of entries, directories included.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Returns `true` if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    pub(crate) fn archive_mut(&mut self) -> &mut ZipArchive<R> {
        &mut self.archive
    }

    fn raw_entries(&mut self) -> Result<Vec<RawEntry>, ArchiveError> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index)?;
            entries.push(RawEntry {
                index,
                path: normalize_entry_path(file.name()),
                is_dir: file.is_dir(),
            });
        }
        Ok(entries)
    }

    /// File entries that count as package content: everything except
    /// directories and the reserved signing paths, in archive order.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Zip`] if the central directory is corrupt.
    pub fn content_entries(&mut self) -> Result<Vec<String>, ArchiveError> {
        Ok(self
            .raw_entries()?
            .into_iter()
            .filter(|e| !e.is_dir && !is_signing_path(&e.path))
            .map(|e| e.path)
            .collect())
    }

    fn find(&mut self, path: &str) -> Result<Option<usize>, ArchiveError> {
        let wanted = normalize_entry_path(path);
        Ok(self
            .raw_entries()?
            .into_iter()
            .find(|e| !e.is_dir && e.path.eq_ignore_ascii_case(&wanted))
            .map(|e| e.index))
    }

    /// Read one entry fully. Path matching is ASCII case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the entry cannot be decompressed.
    pub fn read_entry(&mut self, path: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let Some(index) = self.find(path)? else {
            return Ok(None);
        };
        let mut file = self.archive.by_index(index)?;
        let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    /// Returns `true` if a file entry exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Zip`] if the central directory is corrupt.
    pub fn contains(&mut self, path: &str) -> Result<bool, ArchiveError> {
        Ok(self.find(path)?.is_some())
    }

    /// Parse the root `package.toml`, if the archive has one.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Spec`] if the file exists but is invalid.
    pub fn spec(&mut self) -> Result<Option<PackageSpec>, ArchiveError> {
        match self.read_entry(PACKAGE_SPEC_FILE)? {
            Some(bytes) => Ok(Some(PackageSpec::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Asset groups of one kind, in first-seen order.
    ///
    /// File-backed kinds group entries by the first folder below their root
    /// directory. Files directly under the root, and folders that do not
    /// name a framework, belong to the `Any` group. A directory entry for a
    /// framework folder with no files yields an empty group.
    ///
    /// Framework references come from `package.toml`.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the archive or `package.toml` cannot be
    /// read.
    pub fn groups(&mut self, kind: AssetKind) -> Result<Vec<AssetGroup>, ArchiveError> {
        let Some(root) = kind.root_dir() else {
            return Ok(self
                .spec()?
                .map(|spec| spec.framework_reference_groups())
                .unwrap_or_default());
        };

        let mut groups: Vec<(Framework, Vec<String>)> = Vec::new();
        for entry in self.raw_entries()? {
            let Some(rest) = strip_root(&entry.path, root) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }

            let framework = match rest.split_once('/') {
                Some((folder, _)) => folder_framework(folder),
                None if entry.is_dir => folder_framework(rest),
                None => Framework::Any,
            };

            let slot = match groups.iter().position(|(fw, _)| *fw == framework) {
                Some(i) => i,
                None => {
                    groups.push((framework, Vec::new()));
                    groups.len() - 1
                }
            };
            if !entry.is_dir {
                groups[slot].1.push(entry.path);
            }
        }

        debug!(%kind, groups = groups.len(), "read asset groups");
        Ok(groups
            .into_iter()
            .map(|(framework, items)| AssetGroup::new(framework, items))
            .collect())
    }

    /// Hash every content entry and build a content manifest.
    ///
    /// Each entry is streamed from its own zip handle; the token is checked
    /// before each entry.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Cancelled`] if `token` fires, otherwise any
    /// archive or I/O error.
    pub fn content_manifest(
        &mut self,
        algorithms: &[HashAlgorithm],
        token: &CancellationToken,
    ) -> Result<ContentManifest, ArchiveError> {
        let entries: Vec<RawEntry> = self
            .raw_entries()?
            .into_iter()
            .filter(|e| !e.is_dir && !is_signing_path(&e.path))
            .collect();

        let mut manifest_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            if token.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }
            let file = self.archive.by_index(entry.index)?;
            manifest_entries.push(ManifestEntry::compute(&entry.path, file, algorithms)?);
        }

        Ok(ContentManifest::new(
            pakt_schema::content::CONTENT_MANIFEST_VERSION,
            manifest_entries,
        ))
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> R {
        self.archive.into_inner()
    }
}

/// `lib/net45/A.dll` with root `lib` gives `net45/A.dll`.
fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let prefix = path.get(..=root.len())?;
    let (dir, slash) = prefix.split_at(root.len());
    (dir.eq_ignore_ascii_case(root) && slash == "/").then(|| &path[root.len() + 1..])
}

/// Framework named by an asset folder.
///
/// Unknown framework-shaped names (`monoandroid10`, `uap10.0`,
/// `portable-net45+win8`) stay unsupported and match nothing. Only names
/// that cannot be a framework, such as culture folders, fall back to `Any`.
fn folder_framework(folder: &str) -> Framework {
    match Framework::parse(folder) {
        Framework::Unsupported(raw) if !looks_like_framework(&raw) => {
            debug!(folder = %raw, "folder is not a framework, treating as any");
            Framework::Any
        }
        framework => framework,
    }
}

/// Framework folder names carry a version or a portable profile.
fn looks_like_framework(folder: &str) -> bool {
    folder.contains('+') || folder.chars().any(|c| c.is_ascii_digit())
}

/// A package file on disk that can be read and edited in place.
#[derive(Debug, Clone)]
pub struct ZipPackage {
    path: PathBuf,
}

impl ZipPackage {
    /// Open an existing package file.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the file is missing or not a zip.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let package = Self { path: path.into() };
        package.reader()?;
        Ok(package)
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh reader over the current file contents.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the file cannot be opened as a zip.
    pub fn reader(&self) -> Result<PackageReader<BufReader<File>>, ArchiveError> {
        PackageReader::new(BufReader::new(File::open(&self.path)?))
    }

    fn temp_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl SignedPackage for ZipPackage {
    fn content_manifest(
        &self,
        algorithms: &[HashAlgorithm],
        token: &CancellationToken,
    ) -> Result<ContentManifest, ArchiveError> {
        self.reader()?.content_manifest(algorithms, token)
    }

    fn read_entry(&self, path: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        self.reader()?.read_entry(path)
    }

    fn add_entry(&mut self, path: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        let path = normalize_entry_path(path);
        if self.reader()?.contains(&path)? {
            return Err(ArchiveError::EntryExists(path));
        }

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let mut writer = ZipWriter::new_append(file)?;
        writer.start_file(path.as_str(), SimpleFileOptions::default())?;
        writer.write_all(bytes)?;
        writer.finish()?;
        debug!(package = %self.path.display(), entry = %path, "added entry");
        Ok(())
    }

    fn remove_entries(&mut self, paths: &[&str]) -> Result<usize, ArchiveError> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
        let mut temp = NamedTempFile::new_in(self.temp_dir())?;
        let mut removed = 0;

        {
            let mut writer = ZipWriter::new(temp.as_file_mut());
            for index in 0..archive.len() {
                let file = archive.by_index_raw(index)?;
                let name = normalize_entry_path(file.name());
                if paths.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
                    removed += 1;
                    continue;
                }
                writer.raw_copy_file(file)?;
            }
            writer.finish()?;
        }
        drop(archive);

        // Leave the file untouched when nothing matched.
        if removed > 0 {
            temp.persist(&self.path).map_err(|e| e.error)?;
            debug!(package = %self.path.display(), removed, "removed entries");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    const SPEC: &[u8] = br#"
[package]
id = "A"
version = "1.0.0"

[[framework-assembly]]
name = "System.Net"
target-framework = "net40"
"#;

    #[test]
    fn groups_by_framework_folder() {
        let zip = build_zip(&[
            ("package.toml", SPEC),
            ("lib/net45/A.dll", b"45"),
            ("lib/net20/A.dll", b"20"),
            ("lib/net45/A.xml", b"doc"),
            ("lib/B.dll", b"any"),
            ("lib/fr/A.resources.dll", b"fr"),
            ("content/readme.txt", b"hi"),
            ("build/net45/A.targets", b"<Project/>"),
        ]);
        let mut reader = PackageReader::new(Cursor::new(zip)).unwrap();

        let lib = reader.groups(AssetKind::Lib).unwrap();
        assert_eq!(lib.len(), 3);
        assert_eq!(*lib[0].framework(), Framework::parse("net45"));
        assert_eq!(lib[0].items(), ["lib/net45/A.dll", "lib/net45/A.xml"]);
        assert_eq!(*lib[1].framework(), Framework::parse("net20"));
        assert!(lib[2].framework().is_any());
        assert_eq!(lib[2].items(), ["lib/B.dll", "lib/fr/A.resources.dll"]);

        let content = reader.groups(AssetKind::Content).unwrap();
        assert_eq!(content.len(), 1);
        assert!(content[0].framework().is_any());

        let build = reader.groups(AssetKind::Build).unwrap();
        assert_eq!(build[0].items(), ["build/net45/A.targets"]);

        let fwrefs = reader.groups(AssetKind::FrameworkReference).unwrap();
        assert_eq!(fwrefs[0].items(), ["System.Net.dll"]);
    }

    #[test]
    fn unknown_framework_folders_are_unsupported() {
        let zip = build_zip(&[
            ("lib/monoandroid10/A.dll", b"android"),
            ("lib/uap10.0/A.dll", b"uwp"),
            ("lib/portable-net45+win8/A.dll", b"pcl"),
            ("lib/zh-Hans/A.resources.dll", b"zh"),
        ]);
        let mut reader = PackageReader::new(Cursor::new(zip)).unwrap();
        let lib = reader.groups(AssetKind::Lib).unwrap();

        assert_eq!(lib.len(), 4);
        assert!(lib[0].framework().is_unsupported());
        assert!(lib[1].framework().is_unsupported());
        assert!(lib[2].framework().is_unsupported());
        assert!(lib[3].framework().is_any());
    }

    #[test]
    fn empty_framework_folder_yields_empty_group() {
        let zip = build_zip(&[("lib/net45/", b""), ("lib/net20/A.dll", b"20")]);
        let mut reader = PackageReader::new(Cursor::new(zip)).unwrap();
        let lib = reader.groups(AssetKind::Lib).unwrap();
        assert_eq!(lib.len(), 2);
        assert!(lib[0].is_empty());
    }

    #[test]
    fn missing_groups_are_empty() {
        let zip = build_zip(&[("readme.md", b"x")]);
        let mut reader = PackageReader::new(Cursor::new(zip)).unwrap();
        for kind in AssetKind::ALL {
            assert!(reader.groups(kind).unwrap().is_empty());
        }
        assert!(reader.spec().unwrap().is_none());
    }

    #[test]
    fn content_manifest_skips_signing_entries() {
        let zip = build_zip(&[
            ("lib/net45/A.dll", b"a"),
            (".signature/manifest.json", b"{}"),
            (".signature/signature.sig", b"sig"),
            ("content/", b""),
        ]);
        let mut reader = PackageReader::new(Cursor::new(zip)).unwrap();
        let manifest = reader
            .content_manifest(&[HashAlgorithm::Sha256], &CancellationToken::new())
            .unwrap();
        assert_eq!(manifest.entries().len(), 1);
        assert_eq!(manifest.entries()[0].path, "lib/net45/A.dll");
        assert_eq!(reader.content_entries().unwrap(), ["lib/net45/A.dll"]);
    }

    #[test]
    fn content_manifest_honours_cancellation() {
        let zip = build_zip(&[("a", b"1")]);
        let mut reader = PackageReader::new(Cursor::new(zip)).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            reader.content_manifest(&[HashAlgorithm::Sha256], &token),
            Err(ArchiveError::Cancelled)
        ));
    }

    #[test]
    fn rejects_non_zip_input() {
        assert!(matches!(
            PackageReader::new(Cursor::new(b"not a zip".to_vec())),
            Err(ArchiveError::Zip(_))
        ));
    }

    #[test]
    fn zip_package_add_and_remove() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("A.1.0.0.pakt");
        std::fs::write(&path, build_zip(&[("lib/A.dll", b"a")])).unwrap();

        let mut package = ZipPackage::open(&path).unwrap();
        package.add_entry("extra/x.txt", b"x").unwrap();
        assert_eq!(package.read_entry("extra/x.txt").unwrap().unwrap(), b"x");
        assert!(matches!(
            package.add_entry("EXTRA/x.txt", b"y"),
            Err(ArchiveError::EntryExists(_))
        ));

        assert_eq!(package.remove_entries(&["extra/x.txt"]).unwrap(), 1);
        assert!(package.read_entry("extra/x.txt").unwrap().is_none());
        assert_eq!(package.read_entry("lib/A.dll").unwrap().unwrap(), b"a");
        assert_eq!(package.remove_entries(&["extra/x.txt"]).unwrap(), 0);
    }
}
