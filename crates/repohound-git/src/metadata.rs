//! Reading branch, remote, history and working-copy details.

use chrono::DateTime;
use git2::{BranchType, Commit, ErrorCode, Repository, Sort};

use repohound_core::{CommitSummary, RemoteInfo, RepoStatus, RepositoryMetadata};

/// Branch label reported when HEAD points directly at a commit.
pub const DETACHED_HEAD: &str = "DETACHED HEAD";

/// Number of characters in an abbreviated commit hash.
const SHORT_HASH_LEN: usize = 7;

/// Collect metadata for an opened repository.
pub fn read_metadata(repo: &Repository, commit_limit: usize) -> Result<RepositoryMetadata, git2::Error> {
    let current_branch = current_branch(repo)?;
    let remotes = remotes(repo)?;
    let recent_commits = recent_commits(repo, commit_limit)?;
    let changed_files = changed_files(repo)?;

    let (ahead, behind) = if remotes.is_empty() {
        (0, 0)
    } else {
        ahead_behind(repo).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "error getting ahead/behind counts");
            (0, 0)
        })
    };

    Ok(RepositoryMetadata {
        current_branch,
        remotes,
        recent_commits,
        has_changes: !changed_files.is_empty(),
        status: RepoStatus::derive(changed_files.len(), ahead, behind),
        changed_files,
        ahead,
        behind,
        error: None,
    })
}

/// Name of the checked-out branch.
///
/// An unborn branch reports the name HEAD points at; a detached HEAD reports
/// [`DETACHED_HEAD`].
pub fn current_branch(repo: &Repository) -> Result<String, git2::Error> {
    // Read HEAD itself rather than resolving it, so an unborn branch still
    // reports the name it will have.
    let head = repo.find_reference("HEAD")?;
    let name = match head.symbolic_target() {
        Some(target) => target.strip_prefix("refs/heads/").unwrap_or(target).to_string(),
        None => DETACHED_HEAD.to_string(),
    };
    Ok(name)
}

/// Configured remotes with their fetch URL.
pub fn remotes(repo: &Repository) -> Result<Vec<RemoteInfo>, git2::Error> {
    let names = repo.remotes()?;
    let mut remotes = Vec::with_capacity(names.len());
    for name in names.iter().flatten() {
        let remote = repo.find_remote(name)?;
        remotes.push(RemoteInfo {
            name: name.to_string(),
            url: remote.url().unwrap_or_default().to_string(),
        });
    }
    Ok(remotes)
}

/// Up to `limit` commits reachable from HEAD, newest first.
pub fn recent_commits(repo: &Repository, limit: usize) -> Result<Vec<CommitSummary>, git2::Error> {
    // Nothing to walk while HEAD's branch is unborn.
    if repo.find_reference("HEAD")?.resolve().is_err() {
        return Ok(Vec::new());
    }
    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

    walk.take(limit)
        .map(|oid| -> Result<CommitSummary, git2::Error> {
            let commit = repo.find_commit(oid?)?;
            Ok(summarize(&commit))
        })
        .collect()
}

fn summarize(commit: &Commit<'_>) -> CommitSummary {
    let hash = commit.id().to_string();
    let author = commit.author();
    CommitSummary {
        short_hash: hash.chars().take(SHORT_HASH_LEN).collect(),
        hash,
        message: commit.message().unwrap_or_default().trim().to_string(),
        author: author.name().unwrap_or_default().to_string(),
        author_email: author.email().unwrap_or_default().to_string(),
        date: DateTime::from_timestamp(commit.time().seconds(), 0),
    }
}

/// Tracked files whose working copy differs from the index.
///
/// Staged changes and untracked files are not included.
pub fn changed_files(repo: &Repository) -> Result<Vec<String>, git2::Error> {
    let diff = repo.diff_index_to_workdir(None, None)?;
    Ok(diff
        .deltas()
        .filter_map(|delta| {
            let file = delta.old_file();
            file.path().map(|p| p.to_string_lossy().into_owned())
        })
        .collect())
}

/// Commits ahead of and behind the upstream of the current branch.
///
/// `(0, 0)` when HEAD is not a branch or the branch has no upstream.
pub fn ahead_behind(repo: &Repository) -> Result<(usize, usize), git2::Error> {
    let head = match repo.head() {
        Ok(head) if head.is_branch() => head,
        _ => return Ok((0, 0)),
    };
    let Some(name) = head.shorthand() else {
        return Ok((0, 0));
    };

    let branch = repo.find_branch(name, BranchType::Local)?;
    let upstream = match branch.upstream() {
        Ok(upstream) => upstream,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok((0, 0)),
        Err(err) => return Err(err),
    };

    match (branch.get().target(), upstream.get().target()) {
        (Some(local), Some(remote)) => repo.graph_ahead_behind(local, remote),
        _ => Ok((0, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{RepositoryInitOptions, Signature};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn init(path: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        Repository::init_opts(path, &opts).unwrap()
    }

    fn commit(repo: &Repository, file: &str, message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(file), message).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Ada", "ada@example.com").unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_unborn_branch_name() {
        let temp = TempDir::new().unwrap();
        let repo = init(temp.path());

        assert_eq!(current_branch(&repo).unwrap(), "main");
        assert!(recent_commits(&repo, 5).unwrap().is_empty());
        assert_eq!(ahead_behind(&repo).unwrap(), (0, 0));
    }

    #[test]
    fn test_unborn_default_head() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let expected = repo
            .find_reference("HEAD")
            .unwrap()
            .symbolic_target()
            .unwrap()
            .trim_start_matches("refs/heads/")
            .to_string();

        assert_eq!(current_branch(&repo).unwrap(), expected);
    }

    #[test]
    fn test_detached_head() {
        let temp = TempDir::new().unwrap();
        let repo = init(temp.path());
        let first = commit(&repo, "a.txt", "first");
        commit(&repo, "a.txt", "second");

        repo.set_head_detached(first).unwrap();
        assert_eq!(current_branch(&repo).unwrap(), DETACHED_HEAD);
    }

    #[test]
    fn test_commit_summary_fields() {
        let temp = TempDir::new().unwrap();
        let repo = init(temp.path());
        let oid = commit(&repo, "a.txt", "Add a\n\nLonger body\n");

        let commits = recent_commits(&repo, 5).unwrap();
        assert_eq!(commits.len(), 1);
        let c = &commits[0];
        assert_eq!(c.hash, oid.to_string());
        assert_eq!(c.short_hash, &oid.to_string()[..7]);
        assert_eq!(c.message, "Add a\n\nLonger body");
        assert_eq!(c.author, "Ada");
        assert_eq!(c.author_email, "ada@example.com");
        assert!(c.date.is_some());
    }

    #[test]
    fn test_no_upstream_is_zero() {
        let temp = TempDir::new().unwrap();
        let repo = init(temp.path());
        commit(&repo, "a.txt", "first");

        assert_eq!(ahead_behind(&repo).unwrap(), (0, 0));
    }
}
