//! Git metadata types and the collaborator that supplies them.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::MetadataError;

/// Summary status of a repository working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum RepoStatus {
    /// Tracked files have unstaged modifications.
    Changed,
    /// Both ahead of and behind the upstream.
    Diverged,
    /// Local commits not yet pushed.
    Ahead,
    /// Upstream commits not yet pulled.
    Behind,
    /// In sync with nothing modified.
    Clean,
    /// Metadata could not be read.
    Error,
}

impl RepoStatus {
    /// Derive the status label from working-copy counters.
    pub fn derive(changed_files: usize, ahead: usize, behind: usize) -> Self {
        if changed_files > 0 {
            Self::Changed
        } else if ahead > 0 && behind > 0 {
            Self::Diverged
        } else if ahead > 0 {
            Self::Ahead
        } else if behind > 0 {
            Self::Behind
        } else {
            Self::Clean
        }
    }
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
}

/// A commit in the recent history of HEAD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: String,
    pub short_hash: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub date: Option<DateTime<Utc>>,
}

/// Git details for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// Checked-out branch, or `DETACHED HEAD`.
    pub current_branch: String,
    pub remotes: Vec<RemoteInfo>,
    /// Most recent commits reachable from HEAD, newest first.
    pub recent_commits: Vec<CommitSummary>,
    pub has_changes: bool,
    /// Tracked files with unstaged modifications.
    pub changed_files: Vec<String>,
    pub ahead: usize,
    pub behind: usize,
    pub status: RepoStatus,
    /// Why metadata retrieval failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RepositoryMetadata {
    /// Metadata describing a failed retrieval.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            current_branch: "Unknown".to_string(),
            remotes: Vec::new(),
            recent_commits: Vec::new(),
            has_changes: false,
            changed_files: Vec::new(),
            ahead: 0,
            behind: 0,
            status: RepoStatus::Error,
            error: Some(message.into()),
        }
    }
}

/// State reported by a pull-style operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PullStatus {
    Running,
    Success,
    Completed,
    Error,
}

/// One progress report from a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullUpdate {
    pub message: String,
    pub status: PullStatus,
    /// Name of the transfer phase, e.g. "Receiving objects".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<usize>,
}

impl PullUpdate {
    /// A plain status message.
    pub fn new(message: impl Into<String>, status: PullStatus) -> Self {
        Self {
            message: message.into(),
            status,
            operation: None,
            current: None,
            maximum: None,
        }
    }

    /// A transfer progress report for a named phase.
    pub fn transfer(operation: &str, current: usize, maximum: usize) -> Self {
        let message = if maximum > 0 {
            let percent = current as f64 / maximum as f64 * 100.0;
            format!("{operation}: {percent:.0}% ({current}/{maximum})")
        } else {
            format!("{operation}: {current}")
        };
        Self {
            message,
            status: PullStatus::Running,
            operation: Some(operation.to_string()),
            current: Some(current),
            maximum: (maximum > 0).then_some(maximum),
        }
    }
}

/// Result of a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullOutcome {
    pub success: bool,
    pub message: String,
    /// Per-ref notes such as the new tip of the updated branch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl PullOutcome {
    /// A failed pull.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: Vec::new(),
        }
    }
}

/// Receives pull progress as it happens.
pub type PullSink<'a> = dyn Fn(PullUpdate) + Send + Sync + 'a;

/// Supplies git details for discovered repositories.
pub trait MetadataCollaborator: Send + Sync {
    /// Read branch, remotes, history and working-copy state.
    fn fetch_metadata(&self, path: &Path) -> Result<RepositoryMetadata, MetadataError>;

    /// Pull the current branch from its upstream, reporting through `sink`.
    ///
    /// Failures are reported through the sink and returned as an
    /// unsuccessful outcome rather than an error.
    fn pull(&self, path: &Path, sink: &PullSink<'_>) -> PullOutcome;

    /// Short-format working tree status, or `Clean`.
    fn status(&self, path: &Path) -> Result<String, MetadataError>;

    /// Fetch metadata, folding any failure into an `Error`-status value.
    fn metadata_or_failed(&self, path: &Path) -> RepositoryMetadata {
        self.fetch_metadata(path).unwrap_or_else(|err| {
            tracing::error!(path = %path.display(), error = %err, "error getting repository info");
            RepositoryMetadata::failed(err.to_string())
        })
    }
}
