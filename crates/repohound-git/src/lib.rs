//! git2-backed repository details for repohound.
//!
//! [`Git2Collaborator`] implements [`MetadataCollaborator`]: it reads branch,
//! remote, history and working-copy state, renders short-format status, and
//! pulls by fetching the first remote and fast-forwarding the current branch.
//!
//! Only transports built into libgit2 are available (local paths and
//! `file://` URLs); no credentials are ever supplied.

pub mod metadata;
pub mod pull;
pub mod status;

use std::path::Path;

use git2::Repository;

use repohound_core::{
    MetadataCollaborator, MetadataError, PullOutcome, PullSink, PullStatus, PullUpdate,
    RepositoryMetadata,
};

pub use metadata::DETACHED_HEAD;
pub use status::CLEAN;

/// Default number of commits reported in metadata.
pub const DEFAULT_COMMIT_LIMIT: usize = 5;

/// Open the repository rooted at `path`.
pub fn open(path: &Path) -> Result<Repository, MetadataError> {
    Repository::open(path).map_err(|err| MetadataError::Open {
        path: path.to_path_buf(),
        source: Box::new(err),
    })
}

/// Metadata collaborator backed by libgit2.
#[derive(Debug, Clone, Copy)]
pub struct Git2Collaborator {
    commit_limit: usize,
}

impl Default for Git2Collaborator {
    fn default() -> Self {
        Self {
            commit_limit: DEFAULT_COMMIT_LIMIT,
        }
    }
}

impl Git2Collaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report at most `limit` recent commits.
    pub fn with_commit_limit(mut self, limit: usize) -> Self {
        self.commit_limit = limit;
        self
    }
}

impl MetadataCollaborator for Git2Collaborator {
    fn fetch_metadata(&self, path: &Path) -> Result<RepositoryMetadata, MetadataError> {
        let repo = open(path)?;
        if repo.is_bare() {
            return Err(MetadataError::Bare);
        }
        metadata::read_metadata(&repo, self.commit_limit).map_err(MetadataError::git)
    }

    fn pull(&self, path: &Path, sink: &PullSink<'_>) -> PullOutcome {
        sink(PullUpdate::new(
            format!("Opening repository at {}", path.display()),
            PullStatus::Running,
        ));

        match open(path).and_then(|repo| pull::fast_forward(&repo, sink)) {
            Ok(outcome) => {
                tracing::info!(path = %path.display(), "{}", outcome.message);
                sink(PullUpdate::new(outcome.message.clone(), PullStatus::Completed));
                outcome
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "error pulling repository");
                let message = match err {
                    MetadataError::NoRemotes | MetadataError::LocalChanges(_) => err.to_string(),
                    other => format!("Error: {other}"),
                };
                sink(PullUpdate::new(message.clone(), PullStatus::Error));
                PullOutcome::failed(message)
            }
        }
    }

    fn status(&self, path: &Path) -> Result<String, MetadataError> {
        let repo = open(path)?;
        status::porcelain(&repo).inspect_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "cannot get status");
        })
    }
}
