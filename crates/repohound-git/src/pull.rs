//! Fetch and fast-forward the current branch.

use git2::build::CheckoutBuilder;
use git2::{BranchType, FetchOptions, Oid, Progress, RemoteCallbacks, Repository};

use repohound_core::{MetadataError, PullOutcome, PullSink, PullStatus, PullUpdate};

use crate::metadata::{DETACHED_HEAD, changed_files, current_branch};

/// How many changed files are named before the rest are counted.
const LISTED_CHANGES: usize = 5;

/// Pull the current branch from the first remote.
///
/// Refuses to touch a working copy with unstaged modifications to tracked
/// files and only ever fast-forwards. Staged changes do not block a pull. Intermediate progress goes to `sink`; the final
/// `completed`/`error` report is left to the caller.
pub fn fast_forward(repo: &Repository, sink: &PullSink<'_>) -> Result<PullOutcome, MetadataError> {
    let remotes = repo.remotes().map_err(MetadataError::git)?;
    let Some(remote_name) = remotes.iter().flatten().next().map(str::to_string) else {
        return Err(MetadataError::NoRemotes);
    };

    sink(PullUpdate::new("Checking for local changes", PullStatus::Running));
    let changed = changed_files(repo).map_err(MetadataError::git)?;
    if !changed.is_empty() {
        return Err(MetadataError::LocalChanges(local_changes_message(&changed)));
    }

    let branch = current_branch(repo).map_err(MetadataError::git)?;
    if branch == DETACHED_HEAD {
        return Err(MetadataError::Git("Cannot pull with a detached HEAD".to_string()));
    }

    sink(PullUpdate::new(
        format!("Fetching from remote '{remote_name}'"),
        PullStatus::Running,
    ));
    fetch(repo, &remote_name, sink).map_err(MetadataError::git)?;

    sink(PullUpdate::new(
        format!("Pulling from remote '{remote_name}'"),
        PullStatus::Running,
    ));
    let detail = advance(repo, &branch)?;
    sink(PullUpdate::new(detail.clone(), PullStatus::Success));

    Ok(PullOutcome {
        success: true,
        message: format!("Successfully pulled from {remote_name}"),
        details: vec![detail],
    })
}

/// Summarize modified tracked files, naming the first few.
pub fn local_changes_message(files: &[String]) -> String {
    let listed = files
        .iter()
        .take(LISTED_CHANGES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut message = format!("Repository has local changes: {listed}");
    if files.len() > LISTED_CHANGES {
        message.push_str(&format!(" and {} more", files.len() - LISTED_CHANGES));
    }
    message
}

fn fetch(repo: &Repository, remote_name: &str, sink: &PullSink<'_>) -> Result<(), git2::Error> {
    let mut remote = repo.find_remote(remote_name)?;

    // Only report when the phase or whole percentage changes.
    let mut last: Option<(&'static str, usize)> = None;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |stats: Progress<'_>| {
        let (operation, current, maximum) = if stats.received_objects() < stats.total_objects() {
            ("Receiving objects", stats.received_objects(), stats.total_objects())
        } else if stats.total_deltas() > 0 {
            ("Resolving deltas", stats.indexed_deltas(), stats.total_deltas())
        } else {
            return true;
        };
        let percent = current * 100 / maximum.max(1);
        if last != Some((operation, percent)) {
            last = Some((operation, percent));
            sink(PullUpdate::transfer(operation, current, maximum));
        }
        true
    });

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    remote.fetch(&[] as &[&str], Some(&mut options), None)?;

    let stats = remote.stats();
    tracing::debug!(
        remote = remote_name,
        objects = stats.received_objects(),
        bytes = stats.received_bytes(),
        "fetch finished"
    );
    Ok(())
}

/// Move `branch` to its upstream tip when that is a fast-forward.
///
/// Returns a one-line note describing what changed.
fn advance(repo: &Repository, branch: &str) -> Result<String, MetadataError> {
    let local = repo
        .find_branch(branch, BranchType::Local)
        .map_err(MetadataError::git)?;
    let upstream = local
        .upstream()
        .map_err(|_| MetadataError::Git(format!("Branch '{branch}' has no upstream")))?;
    let upstream_name = upstream
        .name()
        .map_err(MetadataError::git)?
        .unwrap_or("upstream")
        .to_string();
    let target = upstream.get().target().ok_or_else(|| {
        MetadataError::Git(format!("Upstream '{upstream_name}' does not point at a commit"))
    })?;

    let annotated = repo.find_annotated_commit(target).map_err(MetadataError::git)?;
    let (analysis, _) = repo
        .merge_analysis(&[&annotated])
        .map_err(MetadataError::git)?;

    if analysis.is_up_to_date() {
        return Ok(format!("Already up to date with {upstream_name}"));
    }
    if !analysis.is_fast_forward() {
        return Err(MetadataError::NotFastForward {
            upstream: upstream_name,
        });
    }

    let refname = format!("refs/heads/{branch}");
    let previous = local.get().target();
    let mut reference = repo.find_reference(&refname).map_err(MetadataError::git)?;
    reference
        .set_target(target, &format!("pull: fast-forward {branch} to {upstream_name}"))
        .map_err(MetadataError::git)?;
    repo.set_head(&refname).map_err(MetadataError::git)?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))
        .map_err(MetadataError::git)?;

    Ok(format!("{refname}: {}..{}", short(previous), short(Some(target))))
}

fn short(oid: Option<Oid>) -> String {
    oid.map(|oid| oid.to_string().chars().take(7).collect())
        .unwrap_or_else(|| "0000000".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("f{i}.txt")).collect()
    }

    #[test]
    fn test_local_changes_message_short_list() {
        assert_eq!(
            local_changes_message(&files(2)),
            "Repository has local changes: f1.txt, f2.txt"
        );
    }

    #[test]
    fn test_local_changes_message_truncated() {
        assert_eq!(
            local_changes_message(&files(8)),
            "Repository has local changes: f1.txt, f2.txt, f3.txt, f4.txt, f5.txt and 3 more"
        );
    }
}
