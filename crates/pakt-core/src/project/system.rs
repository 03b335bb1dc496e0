//! Build-system adapter.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use pakt_schema::Framework;

use crate::extract::PackageSaveMode;
use crate::reporter::{NullReporter, Reporter};

/// Per-operation state handed to the installer and the build system.
#[derive(Clone)]
pub struct InstallContext {
    /// Receives benign warnings and progress.
    pub reporter: Arc<dyn Reporter>,
    /// Overrides the project's configured save mode for this operation.
    pub save_mode: Option<PackageSaveMode>,
    /// Correlates log lines of one user-level operation.
    pub operation_id: Option<String>,
}

impl fmt::Debug for InstallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallContext")
            .field("save_mode", &self.save_mode)
            .field("operation_id", &self.operation_id)
            .finish_non_exhaustive()
    }
}

impl InstallContext {
    /// Context reporting to `reporter`.
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            save_mode: None,
            operation_id: None,
        }
    }

    /// Override the save mode.
    pub fn with_save_mode(mut self, save_mode: PackageSaveMode) -> Self {
        self.save_mode = Some(save_mode);
        self
    }

    /// Tag the operation.
    pub fn with_operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    /// The operation tag for log fields, `-` when untagged.
    pub fn operation(&self) -> &str {
        self.operation_id.as_deref().unwrap_or("-")
    }
}

impl Default for InstallContext {
    fn default() -> Self {
        Self::new(Arc::new(NullReporter))
    }
}

/// What the installer needs from the underlying build tool.
pub trait ProjectSystem: Send {
    /// Reference an assembly. `path` is absolute for package assemblies and
    /// a bare file name for framework assemblies.
    ///
    /// # Errors
    ///
    /// Returns an error if the build system rejects the reference.
    fn add_reference(&mut self, path: &Path) -> anyhow::Result<()>;

    /// Framework the project compiles against.
    fn target_framework(&self) -> &Framework;

    /// Display name, used in reports.
    fn project_name(&self) -> &str;

    /// Receive the context of the operation about to run.
    fn set_context(&mut self, context: &InstallContext);
}
