//! Shared fixtures for pakt-core integration tests.

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pakt_core::{
    InstallContext, PackageReference, ProjectConfig, ProjectInstaller, ProjectSystem, Reporter,
};
use pakt_schema::{Framework, PackageIdentity};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Build an in-memory package from `(path, bytes)` pairs.
pub fn build_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("failed to start zip entry");
        writer.write_all(data).expect("failed to write zip entry");
    }
    writer
        .finish()
        .expect("failed to finish zip")
        .into_inner()
}

/// A package stream that can only be read forward.
pub struct ForwardOnly(pub Cursor<Vec<u8>>);

impl Read for ForwardOnly {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for ForwardOnly {
    fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "stream is forward-only"))
    }
}

pub fn identity(id: &str, version: &str) -> PackageIdentity {
    PackageIdentity::parse(id, version).expect("invalid identity")
}

/// Build system double that records every call.
#[derive(Debug)]
pub struct FakeProjectSystem {
    pub name: String,
    pub framework: Framework,
    pub references: Vec<PathBuf>,
    pub contexts: usize,
    pub reject_references: bool,
}

impl FakeProjectSystem {
    pub fn new(framework: &str) -> Self {
        Self {
            name: "App".to_string(),
            framework: Framework::parse(framework),
            references: Vec::new(),
            contexts: 0,
            reject_references: false,
        }
    }
}

impl ProjectSystem for FakeProjectSystem {
    fn add_reference(&mut self, path: &Path) -> anyhow::Result<()> {
        if self.reject_references {
            anyhow::bail!("reference rejected");
        }
        self.references.push(path.to_path_buf());
        Ok(())
    }

    fn target_framework(&self) -> &Framework {
        &self.framework
    }

    fn project_name(&self) -> &str {
        &self.name
    }

    fn set_context(&mut self, _context: &InstallContext) {
        self.contexts += 1;
    }
}

/// Reporter that keeps messages for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub done: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().expect("poisoned").clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().expect("poisoned").clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("poisoned").clone()
    }
}

impl Reporter for RecordingReporter {
    fn installing(&self, _: &PackageIdentity, _: &str) {}
    fn uninstalling(&self, _: &PackageIdentity, _: &str) {}
    fn done(&self, identity: &PackageIdentity, detail: &str) {
        self.done
            .lock()
            .expect("poisoned")
            .push(format!("{identity}: {detail}"));
    }
    fn info(&self, msg: &str) {
        self.infos.lock().expect("poisoned").push(msg.to_string());
    }
    fn warning(&self, msg: &str) {
        self.warnings.lock().expect("poisoned").push(msg.to_string());
    }
    fn error(&self, msg: &str) {
        self.errors.lock().expect("poisoned").push(msg.to_string());
    }
}

/// A project rooted in a temporary directory.
pub struct TestProject {
    pub temp_dir: TempDir,
    pub reporter: Arc<RecordingReporter>,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
            reporter: Arc::new(RecordingReporter::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root().join("packages")
    }

    pub fn reference_list(&self) -> PathBuf {
        self.root().join("packages.toml")
    }

    pub fn config(&self, framework: &str) -> ProjectConfig {
        ProjectConfig::new(
            "App",
            Framework::parse(framework),
            self.packages_dir(),
            self.reference_list(),
        )
        .expect("invalid config")
    }

    pub fn installer(&self, framework: &str) -> ProjectInstaller<FakeProjectSystem> {
        ProjectInstaller::new(self.config(framework), FakeProjectSystem::new(framework))
    }

    pub fn context(&self) -> InstallContext {
        InstallContext::new(self.reporter.clone())
    }

    pub fn stored_references(&self) -> Vec<PackageReference> {
        pakt_core::ReferenceListStore::new(self.reference_list())
            .load()
            .expect("failed to read reference list")
            .to_vec()
    }
}
