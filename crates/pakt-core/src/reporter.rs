//! Reporter trait for dependency injection
//!
//! Install and uninstall report benign conditions (already installed, not
//! installed, duplicate references) to the caller through this trait instead
//! of failing. Rendering is the caller's business.

use pakt_schema::PackageIdentity;

/// Caller-visible progress and warnings.
pub trait Reporter: Send + Sync {
    /// A package is about to be installed into `project`.
    fn installing(&self, identity: &PackageIdentity, project: &str);

    /// A package is about to be removed from `project`.
    fn uninstalling(&self, identity: &PackageIdentity, project: &str);

    /// A package operation completed.
    fn done(&self, identity: &PackageIdentity, detail: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn installing(&self, identity: &PackageIdentity, project: &str) {
        (**self).installing(identity, project);
    }
    fn uninstalling(&self, identity: &PackageIdentity, project: &str) {
        (**self).uninstalling(identity, project);
    }
    fn done(&self, identity: &PackageIdentity, detail: &str) {
        (**self).done(identity, detail);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn installing(&self, _: &PackageIdentity, _: &str) {}
    fn uninstalling(&self, _: &PackageIdentity, _: &str) {}
    fn done(&self, _: &PackageIdentity, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

/// Forwards every report to `tracing` under the `pakt::report` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn installing(&self, identity: &PackageIdentity, project: &str) {
        tracing::info!(target: "pakt::report", package = %identity, project, "installing");
    }
    fn uninstalling(&self, identity: &PackageIdentity, project: &str) {
        tracing::info!(target: "pakt::report", package = %identity, project, "uninstalling");
    }
    fn done(&self, identity: &PackageIdentity, detail: &str) {
        tracing::info!(target: "pakt::report", package = %identity, detail, "done");
    }
    fn info(&self, msg: &str) {
        tracing::info!(target: "pakt::report", "{msg}");
    }
    fn warning(&self, msg: &str) {
        tracing::warn!(target: "pakt::report", "{msg}");
    }
    fn error(&self, msg: &str) {
        tracing::error!(target: "pakt::report", "{msg}");
    }
}
