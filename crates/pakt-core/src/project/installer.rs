//! Install and uninstall orchestration for one project.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use pakt_schema::{
    ASSEMBLY_EXTENSIONS, AssetGroup, AssetKind, EMPTY_FOLDER_MARKER, Framework, LIB_DIR,
    PackageIdentity, RESOURCE_ASSEMBLY_SUFFIX,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ProjectConfig;
use super::error::InstallError;
use super::system::{InstallContext, ProjectSystem};
use super::{InstallOutcome, InstallSummary, UninstallOutcome};
use crate::archive::PackageReader;
use crate::extract::{self, ExtractError};
use crate::paths::PackagePathResolver;
use crate::references::{AddOutcome, PackageReference, ReferenceListStore, RemoveOutcome};
use crate::resolver;

/// The groups that apply to the project, one per asset kind.
#[derive(Debug, Default)]
struct ResolvedAssets {
    lib: Option<AssetGroup>,
    framework_references: Option<AssetGroup>,
    content: Option<AssetGroup>,
    build: Option<AssetGroup>,
}

impl ResolvedAssets {
    fn resolve(target: &Framework, groups: Vec<(AssetKind, Vec<AssetGroup>)>) -> Self {
        let mut resolved = Self::default();
        for (kind, candidates) in groups {
            let picked = resolver::pick_best_group(target, &candidates).cloned();
            debug!(%kind, picked = ?picked.as_ref().map(|g| g.framework().to_string()), "resolved");
            match kind {
                AssetKind::Lib => resolved.lib = picked,
                AssetKind::FrameworkReference => resolved.framework_references = picked,
                AssetKind::Content => resolved.content = picked,
                AssetKind::Build => resolved.build = picked,
            }
        }
        resolved
    }

    /// Build files alone never make a package installable.
    fn is_compatible(&self) -> bool {
        resolver::is_usable(self.lib.as_ref())
            || resolver::is_usable(self.framework_references.as_ref())
            || resolver::is_usable(self.content.as_ref())
    }
}

/// Installs packages into one project.
///
/// Owns the project's reference list; operations take `&mut self`, so at
/// most one runs at a time per installer.
#[derive(Debug)]
pub struct ProjectInstaller<S> {
    config: ProjectConfig,
    system: S,
    references: ReferenceListStore,
    paths: PackagePathResolver,
}

impl<S: ProjectSystem> ProjectInstaller<S> {
    /// Installer for the project described by `config`, wired to `system`.
    ///
    /// The build system's framework is authoritative; a mismatch with the
    /// configured framework is logged.
    pub fn new(config: ProjectConfig, system: S) -> Self {
        if *system.target_framework() != config.target_framework {
            warn!(
                configured = %config.target_framework,
                project = %system.target_framework(),
                "project system framework differs from configuration"
            );
        }
        let references = ReferenceListStore::new(&config.reference_list);
        let paths = config.path_resolver();
        Self {
            config,
            system,
            references,
            paths,
        }
    }

    /// The build-system adapter.
    pub fn project_system(&self) -> &S {
        &self.system
    }

    /// The project configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Package folder layout.
    pub fn path_resolver(&self) -> &PackagePathResolver {
        &self.paths
    }

    /// Installed packages, in install order.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::References`] if the reference list cannot be
    /// read.
    pub fn installed_packages(&mut self) -> Result<Vec<PackageReference>, InstallError> {
        Ok(self.references.load()?.to_vec())
    }

    /// Install a package from a seekable stream.
    ///
    /// Returns [`InstallOutcome::AlreadyInstalled`] without writing anything
    /// if the identity is already in the reference list. Completed steps are
    /// not rolled back when a later step fails. Failures other than
    /// cancellation also go to the context's reporter.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::IncompatiblePackage`] if no library,
    /// framework-reference or content group applies to the project,
    /// [`InstallError::Cancelled`] if `token` fires, and the underlying
    /// error if extraction, the reference list or the build system fails.
    pub async fn install_package<R>(
        &mut self,
        identity: &PackageIdentity,
        stream: R,
        context: &InstallContext,
        token: &CancellationToken,
    ) -> Result<InstallOutcome, InstallError>
    where
        R: Read + Seek + Send + 'static,
    {
        let result = self.install(identity, stream, context, token).await;
        if let Err(e) = &result {
            report_failure(context, identity, "install", e);
        }
        result
    }

    async fn install<R>(
        &mut self,
        identity: &PackageIdentity,
        stream: R,
        context: &InstallContext,
        token: &CancellationToken,
    ) -> Result<InstallOutcome, InstallError>
    where
        R: Read + Seek + Send + 'static,
    {
        self.system.set_context(context);
        let project = self.system.project_name().to_string();
        let operation = context.operation();

        if self.references.snapshot()?.contains(identity) {
            warn!(package = %identity, %project, operation, "package already installed");
            context
                .reporter
                .warning(&format!("{identity} is already installed in {project}"));
            return Ok(InstallOutcome::AlreadyInstalled);
        }
        if token.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        context.reporter.installing(identity, &project);

        let framework = self.system.target_framework().clone();
        let (stream, groups) = tokio::task::spawn_blocking(move || read_groups(stream))
            .await
            .map_err(|e| InstallError::Other(format!("Task panic: {e}")))??;

        let assets = ResolvedAssets::resolve(&framework, groups);
        if !assets.is_compatible() {
            return Err(InstallError::IncompatiblePackage {
                identity: identity.clone(),
                framework,
            });
        }

        let extraction = {
            let mut stream = stream;
            let identity = identity.clone();
            let paths = self.paths.clone();
            let options = self.config.extraction_options(context.save_mode);
            let token = token.clone();
            tokio::task::spawn_blocking(move || {
                extract::extract_package(&mut stream, &identity, &paths, options, &token)
            })
            .await
            .map_err(|e| InstallError::Other(format!("Task panic: {e}")))??
        };

        if extraction.satellite_files_copied {
            context
                .reporter
                .info(&format!("{identity} satellite files copied into its runtime package"));
        }

        let reference = PackageReference::new(identity.clone(), framework);
        if self.references.add(reference)? == AddOutcome::AlreadyExists {
            context
                .reporter
                .warning(&format!("{identity} is already referenced by {project}"));
        }

        let install_dir = self.paths.install_path(identity);
        let mut references = Vec::new();
        if let Some(lib) = &assets.lib {
            for item in lib.items().iter().filter(|item| is_lib_reference(item)) {
                references.push(join_entry(&install_dir, item));
            }
        }
        if let Some(framework_references) = &assets.framework_references {
            for item in framework_references
                .items()
                .iter()
                .filter(|item| is_assembly_reference(item))
            {
                references.push(PathBuf::from(file_name(item)));
            }
        }
        for path in &references {
            if token.is_cancelled() {
                return Err(InstallError::Cancelled);
            }
            self.system
                .add_reference(path)
                .map_err(|e| InstallError::ProjectSystem(format!("{}: {e}", path.display())))?;
            debug!(package = %identity, reference = %path.display(), operation, "added reference");
        }

        info!(
            package = %identity,
            %project,
            operation,
            files = extraction.files.len(),
            references = references.len(),
            build_assets = assets.build.is_some(),
            "package installed"
        );
        context.reporter.done(identity, "installed");
        Ok(InstallOutcome::Installed(InstallSummary {
            references,
            files: extraction.files,
        }))
    }

    /// Uninstall a package.
    ///
    /// Returns [`UninstallOutcome::NotInstalled`] without touching anything
    /// if the identity is not in the reference list. Otherwise satellite
    /// files, the package directory and the reference are removed, and the
    /// call fails with [`InstallError::NotImplemented`] because build-system
    /// references are not unwound.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::NotImplemented`] after removing files and the
    /// reference, or the underlying error if a removal step fails.
    pub async fn uninstall_package(
        &mut self,
        identity: &PackageIdentity,
        context: &InstallContext,
        token: &CancellationToken,
    ) -> Result<UninstallOutcome, InstallError> {
        let result = self.uninstall(identity, context, token).await;
        if let Err(e) = &result {
            report_failure(context, identity, "uninstall", e);
        }
        result
    }

    async fn uninstall(
        &mut self,
        identity: &PackageIdentity,
        context: &InstallContext,
        token: &CancellationToken,
    ) -> Result<UninstallOutcome, InstallError> {
        self.system.set_context(context);
        let project = self.system.project_name().to_string();
        let operation = context.operation();

        if !self.references.snapshot()?.contains(identity) {
            warn!(package = %identity, %project, operation, "package not installed");
            context
                .reporter
                .warning(&format!("{identity} is not installed in {project}"));
            return Ok(UninstallOutcome::NotInstalled);
        }
        context.reporter.uninstalling(identity, &project);

        {
            let identity = identity.clone();
            let paths = self.paths.clone();
            let save_mode = self.config.extraction_options(context.save_mode).save_mode;
            let token = token.clone();
            tokio::task::spawn_blocking(move || -> Result<(), ExtractError> {
                extract::remove_satellite_files(&identity, &paths, save_mode, &token)?;
                extract::remove_package_files(&identity, &paths, &token)?;
                Ok(())
            })
            .await
            .map_err(|e| InstallError::Other(format!("Task panic: {e}")))??;
        }

        if self.references.remove(identity)? == RemoveOutcome::NotFound {
            context
                .reporter
                .warning(&format!("{identity} was not referenced by {project}"));
        }
        info!(package = %identity, %project, operation, "package files and reference removed");

        // TODO: return UninstallOutcome::Uninstalled once build-system
        // reference removal exists.
        Err(InstallError::NotImplemented("build system reference removal"))
    }
}

/// Send a failure to the context's reporter. Cancellation is not reported.
fn report_failure(
    context: &InstallContext,
    identity: &PackageIdentity,
    action: &str,
    err: &InstallError,
) {
    if matches!(err, InstallError::Cancelled) {
        return;
    }
    warn!(package = %identity, operation = context.operation(), error = %err, "{action} failed");
    context.reporter.error(&format!("{action} of {identity} failed: {err}"));
}

type KindGroups = Vec<(AssetKind, Vec<AssetGroup>)>;

/// Read every kind's groups, then rewind the stream for extraction.
fn read_groups<R: Read + Seek>(mut stream: R) -> Result<(R, KindGroups), InstallError> {
    let start = stream
        .stream_position()
        .map_err(|_| ExtractError::NotSeekable)?;

    let mut reader = PackageReader::new(stream)?;
    let mut groups = Vec::with_capacity(AssetKind::ALL.len());
    for kind in AssetKind::ALL {
        groups.push((kind, reader.groups(kind)?));
    }

    let mut stream = reader.into_inner();
    stream.seek(SeekFrom::Start(start))?;
    Ok((stream, groups))
}

/// A framework-reference item names an assembly the build system resolves.
fn is_assembly_reference(item: &str) -> bool {
    let lower = item.to_ascii_lowercase();
    file_name(&lower) != EMPTY_FOLDER_MARKER
        && !lower.ends_with(RESOURCE_ASSEMBLY_SUFFIX)
        && ASSEMBLY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// A library item is referenced only when it lives under `lib/`.
fn is_lib_reference(item: &str) -> bool {
    let under_lib = item
        .split_once('/')
        .is_some_and(|(root, _)| root.eq_ignore_ascii_case(LIB_DIR));
    under_lib && is_assembly_reference(item)
}

fn file_name(item: &str) -> &str {
    item.rsplit('/').next().unwrap_or(item)
}

fn join_entry(dir: &Path, item: &str) -> PathBuf {
    item.split('/')
        .filter(|c| !c.is_empty())
        .fold(dir.to_path_buf(), |path, component| path.join(component))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lib_reference_filter() {
        assert!(is_lib_reference("lib/net45/A.dll"));
        assert!(is_lib_reference("Lib/net45/Tool.EXE"));
        assert!(is_lib_reference("lib/win8/A.winmd"));
        assert!(is_lib_reference("lib/A.dll"));

        assert!(!is_lib_reference("lib/net45/_._"));
        assert!(!is_lib_reference("lib/net45/fr/A.resources.dll"));
        assert!(!is_lib_reference("lib/net45/A.xml"));
        assert!(!is_lib_reference("content/A.dll"));
        assert!(!is_lib_reference("A.dll"));
    }

    #[test]
    fn framework_references_need_no_lib_root() {
        assert!(is_assembly_reference("System.Net.dll"));
        assert!(!is_assembly_reference("System.Net"));
        assert!(!is_assembly_reference("_._"));
    }

    #[test]
    fn build_only_is_incompatible() {
        let assets = ResolvedAssets {
            build: Some(AssetGroup::new(Framework::Any, vec!["build/A.props".into()])),
            ..ResolvedAssets::default()
        };
        assert!(!assets.is_compatible());
    }

    #[test]
    fn empty_matched_group_is_compatible() {
        let assets = ResolvedAssets {
            lib: Some(AssetGroup::new(Framework::parse("net45"), Vec::new())),
            ..ResolvedAssets::default()
        };
        assert!(assets.is_compatible());
    }

    #[test]
    fn joins_entry_components() {
        let joined = join_entry(Path::new("/p/A.1.0.0"), "lib/net45/A.dll");
        assert_eq!(joined, Path::new("/p/A.1.0.0/lib/net45/A.dll"));
    }
}
