//! Error types for sessions, the progress bus, storage and the hub.

use std::path::PathBuf;

use thiserror::Error;

use repohound_core::{MetadataError, RepoId, ScanError};

use crate::session::SessionSnapshot;

/// Failure to start a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation of the same kind is running.
    #[error("A {} operation is already in progress", .0.kind)]
    AlreadyActive(SessionSnapshot),
}

/// Failure to read from the progress bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// Every sender is gone; no further events will arrive.
    #[error("Progress bus closed")]
    Closed,
}

/// Failure to persist or read scan results.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not access results file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not encode results: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of an operation run through the hub.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Repository not found: {0}")]
    UnknownRepository(RepoId),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The worker panicked; the payload message if it had one.
    #[error("Worker panicked: {0}")]
    Panicked(String),
}
