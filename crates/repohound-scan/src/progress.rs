//! Scan progress reporting.

use std::path::{Path, PathBuf};

/// A discrete progress update emitted while walking the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUpdate {
    /// A directory at depth 2 or shallower is being scanned.
    Entering { path: PathBuf, depth: u32 },
    /// A repository root was classified.
    RepositoryFound { path: PathBuf, depth: u32 },
    /// Scanning a child directory failed.
    Failed { path: PathBuf, message: String },
}

impl ScanUpdate {
    /// Path the update refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Entering { path, .. }
            | Self::RepositoryFound { path, .. }
            | Self::Failed { path, .. } => path,
        }
    }

    /// Whether this update reports a newly found repository.
    pub fn is_repository(&self) -> bool {
        matches!(self, Self::RepositoryFound { .. })
    }

    /// Whether this update reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Human-readable message for this update.
    pub fn message(&self) -> String {
        match self {
            Self::Entering { path, .. } => format!("Scanning: {}", path.display()),
            Self::RepositoryFound { path, .. } => {
                format!("Found Git repository: {}", path.display())
            }
            Self::Failed { path, message } => {
                format!("Error scanning {}: {message}", path.display())
            }
        }
    }
}

/// Receives progress updates from scanner worker threads.
///
/// Called concurrently from the scan pool; implementations must not block
/// for longer than it takes to hand the update off.
pub trait ProgressSink: Sync {
    fn emit(&self, update: ScanUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ScanUpdate) + Sync,
{
    fn emit(&self, update: ScanUpdate) {
        self(update)
    }
}

/// A sink that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _update: ScanUpdate) {}
}
