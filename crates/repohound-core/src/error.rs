//! Error types for scanning and repository operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found, possibly removed while the scan was running.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this is a recoverable filesystem access error.
    pub fn is_access_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::NotFound { .. })
    }

    /// The path the error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::PermissionDenied { path }
            | Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::NotADirectory { path } => Some(path),
            Self::InvalidConfig { .. } | Self::Other { .. } => None,
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Directory disappeared during the scan.
    Vanished,
    /// Error reading a directory or entry.
    ReadError,
    /// An ignore-pattern file could not be parsed.
    IgnoreParse,
    /// Scanning a child directory failed.
    ChildFailed,
}

/// Non-fatal warning encountered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a warning for a directory removed mid-scan.
    pub fn vanished(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Directory not found (possibly removed during scan): {}", path.display()),
            path,
            kind: WarningKind::Vanished,
        }
    }

    /// Create a read error warning.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self {
            message: format!("Read error: {error}"),
            path: path.into(),
            kind: WarningKind::ReadError,
        }
    }

    /// Convert a child scan failure into a warning.
    pub fn child_failed(path: impl Into<PathBuf>, error: &ScanError) -> Self {
        let path = path.into();
        Self {
            message: format!("Error scanning {}: {error}", path.display()),
            path,
            kind: WarningKind::ChildFailed,
        }
    }
}

/// Errors returned by a metadata collaborator.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The path could not be opened as a repository.
    #[error("Not a git repository: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A git operation failed.
    #[error("{0}")]
    Git(String),

    /// The repository has no remotes to pull from.
    #[error("Repository has no remotes")]
    NoRemotes,

    /// The working tree has uncommitted changes.
    #[error("{0}")]
    LocalChanges(String),

    /// Local and upstream history have diverged.
    #[error("Cannot fast-forward: local branch has diverged from {upstream}")]
    NotFastForward { upstream: String },

    /// The repository has no working tree.
    #[error("Bare repository, cannot display status.")]
    Bare,
}

impl MetadataError {
    /// Wrap any displayable git error.
    pub fn git(err: impl std::fmt::Display) -> Self {
        Self::Git(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_io() {
        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));
        assert!(err.is_access_error());

        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(matches!(err, ScanError::Io { .. }));
        assert!(!err.is_access_error());
        assert_eq!(err.path(), Some(&PathBuf::from("/test/path")));
    }

    #[test]
    fn test_scan_warning_creation() {
        let warning = ScanWarning::permission_denied("/test/path");
        assert_eq!(warning.kind, WarningKind::PermissionDenied);
        assert!(warning.message.contains("Permission denied"));

        let err = ScanError::NotFound {
            path: "/test/gone".into(),
        };
        let warning = ScanWarning::child_failed("/test/gone", &err);
        assert_eq!(warning.kind, WarningKind::ChildFailed);
        assert!(warning.message.starts_with("Error scanning /test/gone"));
    }

    #[test]
    fn test_metadata_error_messages() {
        assert_eq!(MetadataError::NoRemotes.to_string(), "Repository has no remotes");
        let err = MetadataError::NotFastForward {
            upstream: "origin/main".to_string(),
        };
        assert!(err.to_string().contains("origin/main"));
    }
}
