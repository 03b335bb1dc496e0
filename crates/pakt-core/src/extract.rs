//! Archive extraction module
//!
//! Materializes a package under its install directory, then propagates
//! satellite (localized resource) files into the runtime package it
//! localizes.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use pakt_schema::{LIB_DIR, PackageIdentity, is_signing_path};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::archive::{ArchiveError, PackageReader};
use crate::paths::PackagePathResolver;

/// Errors raised while extracting or removing package files.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The input stream cannot report or restore its position.
    #[error("Package stream must be seekable")]
    NotSeekable,

    /// Underlying storage failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive could not be read.
    #[error("Archive error: {0}")]
    Archive(ArchiveError),

    /// An entry would land outside the install directory.
    #[error("Invalid path in archive: {0}")]
    InvalidPath(String),

    /// The operation was cancelled between entries.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<ArchiveError> for ExtractError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Cancelled => Self::Cancelled,
            ArchiveError::Io(e) => Self::Io(e),
            other => Self::Archive(other),
        }
    }
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(ArchiveError::Zip(err))
    }
}

/// What to write when a package is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageSaveMode {
    /// Loose files only.
    Files,
    /// Only the canonical archive copy.
    Archive,
    /// Loose files plus the canonical archive copy.
    #[default]
    FilesAndArchive,
}

impl PackageSaveMode {
    /// Whether loose files are written.
    pub fn includes_files(self) -> bool {
        matches!(self, Self::Files | Self::FilesAndArchive)
    }

    /// Whether the canonical archive copy is written.
    pub fn includes_archive(self) -> bool {
        matches!(self, Self::Archive | Self::FilesAndArchive)
    }
}

/// Extraction knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Which artifacts to write.
    pub save_mode: PackageSaveMode,
    /// Propagate satellite files into the runtime package after extraction.
    pub copy_satellite_files: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            save_mode: PackageSaveMode::default(),
            copy_satellite_files: true,
        }
    }
}

/// Outcome of [`extract_package`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Absolute paths written, in archive order; the archive copy is last.
    pub files: Vec<PathBuf>,
    /// Whether satellite files were copied into a runtime package.
    pub satellite_files_copied: bool,
}

/// Extract a package stream under its install directory.
///
/// Loose files are written first. The canonical archive copy is written
/// last by rewinding `stream` to the position it had on entry, so the
/// stream may start mid-file.
///
/// # Errors
///
/// Returns [`ExtractError::NotSeekable`] if the stream cannot report its
/// position, [`ExtractError::InvalidPath`] for entries escaping the install
/// directory, and [`ExtractError::Cancelled`] if `token` fires between
/// entries.
pub fn extract_package<R: Read + Seek>(
    stream: &mut R,
    identity: &PackageIdentity,
    resolver: &PackagePathResolver,
    options: ExtractionOptions,
    token: &CancellationToken,
) -> Result<ExtractionResult, ExtractError> {
    let start = stream
        .stream_position()
        .map_err(|_| ExtractError::NotSeekable)?;

    let install_dir = resolver.install_path(identity);
    fs::create_dir_all(&install_dir)?;
    info!(package = %identity, dir = %install_dir.display(), "extracting package");

    let mut files = Vec::new();
    if options.save_mode.includes_files() {
        let mut archive = ZipArchive::new(&mut *stream)?;
        files = write_entries(&mut archive, &install_dir, |_| true, token)?;
    }

    if options.save_mode.includes_archive() {
        stream.seek(SeekFrom::Start(start))?;
        let archive_path = resolver.package_file_path(identity);
        let mut out = File::create(&archive_path)?;
        io::copy(stream, &mut out)?;
        files.push(archive_path);
    }

    let satellite_files_copied = if options.copy_satellite_files {
        copy_satellite_files(identity, resolver, options.save_mode, token)?
    } else {
        false
    };

    debug!(package = %identity, files = files.len(), satellite_files_copied, "extraction complete");
    Ok(ExtractionResult {
        files,
        satellite_files_copied,
    })
}

/// Write file entries accepted by `filter` under `dest`, skipping the
/// signing entries. Returns the absolute paths written.
fn write_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    dest: &Path,
    filter: impl Fn(&str) -> bool,
    token: &CancellationToken,
) -> Result<Vec<PathBuf>, ExtractError> {
    let mut written = Vec::new();
    for index in 0..archive.len() {
        if token.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        let mut file = archive.by_index(index)?;
        if file.is_dir() || is_signing_path(file.name()) || !filter(file.name()) {
            continue;
        }
        let relative = file
            .enclosed_name()
            .ok_or_else(|| ExtractError::InvalidPath(file.name().to_string()))?;

        let absolute = dest.join(&relative);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }

        // Overwrite: a reinstall replaces stale files.
        let mut outfile = File::create(&absolute)?;
        io::copy(&mut file, &mut outfile)?;

        apply_unix_mode(&absolute, file.unix_mode())?;
        written.push(absolute);
    }
    Ok(written)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

/// Satellite entries of an installed package and where they belong.
#[derive(Debug)]
struct SatelliteFiles {
    language: String,
    runtime_dir: PathBuf,
    reader: PackageReader<BufReader<File>>,
}

impl SatelliteFiles {
    fn entry_names(&mut self) -> Result<Vec<String>, ExtractError> {
        let language = self.language.as_str();
        let archive = self.reader.archive_mut();
        let mut names = Vec::new();
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index)?;
            if !file.is_dir() && is_satellite_entry(file.name(), language) {
                names.push(file.name().to_string());
            }
        }
        Ok(names)
    }
}

/// `lib/` entries with a directory segment naming the language.
fn is_satellite_entry(name: &str, language: &str) -> bool {
    let normalized = pakt_schema::normalize_entry_path(name);
    let mut segments: Vec<&str> = normalized.split('/').collect();
    segments.pop();
    segments.len() > 1
        && segments[0].eq_ignore_ascii_case(LIB_DIR)
        && segments[1..].iter().any(|s| s.eq_ignore_ascii_case(language))
}

/// Locate satellite files using the installed canonical archive copy.
///
/// `None` means no satellites: no archive copy, no declared language, no
/// installed runtime package, or a package id that does not end in
/// `.{language}`.
fn satellite_files(
    identity: &PackageIdentity,
    resolver: &PackagePathResolver,
) -> Result<Option<SatelliteFiles>, ExtractError> {
    let archive_path = resolver.package_file_path(identity);
    if !archive_path.is_file() {
        return Ok(None);
    }

    let mut reader = PackageReader::new(BufReader::new(File::open(&archive_path)?))?;
    let Some(spec) = reader.spec()? else {
        return Ok(None);
    };
    let (Some(language), Some(runtime)) = (spec.satellite_language(), spec.satellite_runtime_identity())
    else {
        return Ok(None);
    };

    let runtime_dir = resolver.install_path(&runtime);
    if !runtime_dir.is_dir() {
        debug!(package = %identity, runtime = %runtime, "runtime package not installed");
        return Ok(None);
    }

    Ok(Some(SatelliteFiles {
        language: language.to_string(),
        runtime_dir,
        reader,
    }))
}

/// Copy a satellite package's localized resources into its runtime
/// package's directory. Returns whether anything was copied.
///
/// # Errors
///
/// Returns an [`ExtractError`] if the archive copy cannot be read or the
/// files cannot be written.
pub fn copy_satellite_files(
    identity: &PackageIdentity,
    resolver: &PackagePathResolver,
    save_mode: PackageSaveMode,
    token: &CancellationToken,
) -> Result<bool, ExtractError> {
    if !save_mode.includes_files() {
        return Ok(false);
    }
    let Some(mut satellites) = satellite_files(identity, resolver)? else {
        return Ok(false);
    };

    let names = satellites.entry_names()?;
    let runtime_dir = satellites.runtime_dir.clone();
    let written = write_entries(
        satellites.reader.archive_mut(),
        &runtime_dir,
        |name| names.iter().any(|n| n == name),
        token,
    )?;

    if !written.is_empty() {
        info!(
            package = %identity,
            files = written.len(),
            runtime = %runtime_dir.display(),
            "copied satellite files"
        );
    }
    Ok(!written.is_empty())
}

/// Delete a satellite package's files from its runtime package's directory
/// and prune directories left empty. Returns whether any satellite files
/// were found.
///
/// # Errors
///
/// Returns an [`ExtractError`] if the archive copy cannot be read or a file
/// cannot be deleted.
pub fn remove_satellite_files(
    identity: &PackageIdentity,
    resolver: &PackagePathResolver,
    save_mode: PackageSaveMode,
    token: &CancellationToken,
) -> Result<bool, ExtractError> {
    if !save_mode.includes_files() {
        return Ok(false);
    }
    let Some(mut satellites) = satellite_files(identity, resolver)? else {
        return Ok(false);
    };

    let names = satellites.entry_names()?;
    for name in &names {
        if token.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        let relative = enclosed(name)?;
        let target = satellites.runtime_dir.join(&relative);
        match fs::remove_file(&target) {
            Ok(()) => prune_empty_dirs(&target, &satellites.runtime_dir),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    if !names.is_empty() {
        info!(package = %identity, files = names.len(), "removed satellite files");
    }
    Ok(!names.is_empty())
}

/// Delete a package's install directory. Returns whether it existed.
///
/// # Errors
///
/// Returns [`ExtractError::Cancelled`] if `token` has fired, or the I/O
/// error from the removal.
pub fn remove_package_files(
    identity: &PackageIdentity,
    resolver: &PackagePathResolver,
    token: &CancellationToken,
) -> Result<bool, ExtractError> {
    if token.is_cancelled() {
        return Err(ExtractError::Cancelled);
    }
    let dir = resolver.install_path(identity);
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            info!(package = %identity, dir = %dir.display(), "removed package files");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Archive name to a relative path that cannot escape its root.
fn enclosed(name: &str) -> Result<PathBuf, ExtractError> {
    let normalized = pakt_schema::normalize_entry_path(name);
    let path = Path::new(&normalized);
    let safe = path
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_)));
    if safe && !normalized.is_empty() {
        Ok(path.to_path_buf())
    } else {
        Err(ExtractError::InvalidPath(name.to_string()))
    }
}

/// Remove empty parents of `file` up to, not including, `root`.
fn prune_empty_dirs(file: &Path, root: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk.
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn identity(id: &str) -> PackageIdentity {
        PackageIdentity::parse(id, "1.0.0").unwrap()
    }

    /// Forward-only reader.
    struct Forward(Cursor<Vec<u8>>);

    impl Read for Forward {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Seek for Forward {
        fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "not seekable"))
        }
    }

    #[test]
    fn forward_only_stream_is_rejected_before_writing() {
        let dir = tempdir().unwrap();
        let resolver = PackagePathResolver::new(dir.path());
        let mut stream = Forward(Cursor::new(build_zip(&[("lib/net45/A.dll", b"dll")])));

        let err = extract_package(
            &mut stream,
            &identity("A"),
            &resolver,
            ExtractionOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ExtractError::NotSeekable));
        assert!(!resolver.install_path(&identity("A")).exists());
    }

    #[test]
    fn extracts_files_then_archive_copy() {
        let dir = tempdir().unwrap();
        let resolver = PackagePathResolver::new(dir.path());
        let bytes = build_zip(&[
            ("lib/net45/A.dll", b"dll"),
            (".signature/signature.sig", b"sig"),
        ]);

        let result = extract_package(
            &mut Cursor::new(bytes.clone()),
            &identity("A"),
            &resolver,
            ExtractionOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        let install = resolver.install_path(&identity("A"));
        assert_eq!(fs::read(install.join("lib/net45/A.dll")).unwrap(), b"dll");
        assert!(!install.join(".signature/signature.sig").exists());
        assert_eq!(result.files.len(), 2);
        assert_eq!(
            result.files.last().unwrap(),
            &resolver.package_file_path(&identity("A"))
        );
        assert_eq!(fs::read(resolver.package_file_path(&identity("A"))).unwrap(), bytes);
        assert!(!result.satellite_files_copied);
    }

    #[test]
    fn archive_copy_starts_at_entry_position() {
        let dir = tempdir().unwrap();
        let resolver = PackagePathResolver::new(dir.path());
        let zip = build_zip(&[("content/a.txt", b"a")]);
        let mut prefixed = b"JUNK".to_vec();
        prefixed.extend_from_slice(&zip);

        let mut stream = Cursor::new(prefixed);
        stream.seek(SeekFrom::Start(4)).unwrap();
        let options = ExtractionOptions {
            save_mode: PackageSaveMode::Archive,
            copy_satellite_files: false,
        };
        let result = extract_package(
            &mut stream,
            &identity("A"),
            &resolver,
            options,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(fs::read(&result.files[0]).unwrap(), zip);
    }

    #[test]
    fn honours_cancellation() {
        let dir = tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = extract_package(
            &mut Cursor::new(build_zip(&[("a.txt", b"a")])),
            &identity("A"),
            &PackagePathResolver::new(dir.path()),
            ExtractionOptions::default(),
            &token,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::Cancelled));
    }

    #[test]
    fn satellite_files_follow_runtime_package() {
        let dir = tempdir().unwrap();
        let resolver = PackagePathResolver::new(dir.path());
        let token = CancellationToken::new();

        let runtime = build_zip(&[("lib/net45/Contoso.dll", b"dll")]);
        extract_package(
            &mut Cursor::new(runtime),
            &identity("Contoso"),
            &resolver,
            ExtractionOptions::default(),
            &token,
        )
        .unwrap();

        let satellite = build_zip(&[
            (
                "package.toml",
                b"[package]\nid = \"Contoso.fr\"\nversion = \"1.0.0\"\nlanguage = \"fr\"\n",
            ),
            ("lib/net45/fr/Contoso.resources.dll", b"fr"),
            ("content/readme.txt", b"not a satellite"),
        ]);
        let result = extract_package(
            &mut Cursor::new(satellite),
            &identity("Contoso.fr"),
            &resolver,
            ExtractionOptions::default(),
            &token,
        )
        .unwrap();
        assert!(result.satellite_files_copied);

        let runtime_dir = resolver.install_path(&identity("Contoso"));
        let copied = runtime_dir.join("lib/net45/fr/Contoso.resources.dll");
        assert_eq!(fs::read(&copied).unwrap(), b"fr");
        assert!(!runtime_dir.join("content/readme.txt").exists());

        let removed = remove_satellite_files(
            &identity("Contoso.fr"),
            &resolver,
            PackageSaveMode::default(),
            &token,
        )
        .unwrap();
        assert!(removed);
        assert!(!copied.exists());
        assert!(!runtime_dir.join("lib/net45/fr").exists());
        assert!(runtime_dir.join("lib/net45/Contoso.dll").exists());
    }

    #[test]
    fn no_satellites_without_runtime_package() {
        let dir = tempdir().unwrap();
        let resolver = PackagePathResolver::new(dir.path());
        let satellite = build_zip(&[
            (
                "package.toml",
                b"[package]\nid = \"Contoso.fr\"\nversion = \"1.0.0\"\nlanguage = \"fr\"\n",
            ),
            ("lib/net45/fr/Contoso.resources.dll", b"fr"),
        ]);
        let result = extract_package(
            &mut Cursor::new(satellite),
            &identity("Contoso.fr"),
            &resolver,
            ExtractionOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(!result.satellite_files_copied);
        assert!(
            !remove_satellite_files(
                &identity("Contoso.fr"),
                &resolver,
                PackageSaveMode::default(),
                &CancellationToken::new()
            )
            .unwrap()
        );
    }

    #[test]
    fn remove_package_files_is_idempotent() {
        let dir = tempdir().unwrap();
        let resolver = PackagePathResolver::new(dir.path());
        let token = CancellationToken::new();
        fs::create_dir_all(resolver.install_path(&identity("A")).join("lib")).unwrap();

        assert!(remove_package_files(&identity("A"), &resolver, &token).unwrap());
        assert!(!resolver.install_path(&identity("A")).exists());
        assert!(!remove_package_files(&identity("A"), &resolver, &token).unwrap());
    }

    #[test]
    fn rejects_escaping_paths() {
        assert!(enclosed("../evil.dll").is_err());
        assert!(enclosed("lib/../../evil.dll").is_err());
        assert_eq!(enclosed("lib\\fr\\a.dll").unwrap(), Path::new("lib/fr/a.dll"));
    }
}
