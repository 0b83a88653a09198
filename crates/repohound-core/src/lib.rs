//! Core types and traits for repohound.
//!
//! This crate provides the data structures shared by the scanner, the git
//! collaborator and the session layer: configuration, error taxonomy,
//! repository/directory records, the persisted scan report, and the
//! [`MetadataCollaborator`] seam.

mod config;
mod error;
mod metadata;
mod record;
mod report;

pub use config::{
    DEFAULT_EXCLUDED_NAMES, DEFAULT_IGNORE_FILE, DEFAULT_MAX_DEPTH, ScanConfig, ScanConfigBuilder,
    Settings,
};
pub use error::{MetadataError, ScanError, ScanWarning, WarningKind};
pub use metadata::{
    CommitSummary, MetadataCollaborator, PullOutcome, PullSink, PullStatus, PullUpdate,
    RemoteInfo, RepoStatus, RepositoryMetadata,
};
pub use record::{DirectoryRecord, RepoId, RepositoryRecord};
pub use report::{ScanReport, ScanSummary};
