//! Short-format working tree status.

use git2::{Repository, Status, StatusEntry, StatusOptions};

use repohound_core::MetadataError;

/// Text reported when the working tree has nothing to show.
pub const CLEAN: &str = "Clean";

/// Render the working tree status the way `git status --porcelain` does.
///
/// Untracked files are included, ignored files are not. Returns [`CLEAN`]
/// when there is nothing to report.
pub fn porcelain(repo: &Repository) -> Result<String, MetadataError> {
    if repo.is_bare() {
        return Err(MetadataError::Bare);
    }

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(false)
        .include_ignored(false)
        .renames_head_to_index(true);

    let statuses = repo.statuses(Some(&mut options)).map_err(MetadataError::git)?;
    let lines: Vec<String> = statuses.iter().filter_map(|entry| line(&entry)).collect();

    if lines.is_empty() {
        Ok(CLEAN.to_string())
    } else {
        Ok(lines.join("\n"))
    }
}

fn line(entry: &StatusEntry<'_>) -> Option<String> {
    let status = entry.status();
    if status.is_ignored() {
        return None;
    }

    let path = String::from_utf8_lossy(entry.path_bytes());
    if status.is_conflicted() {
        return Some(format!("UU {path}"));
    }
    if status == Status::WT_NEW {
        return Some(format!("?? {path}"));
    }

    let (x, y) = (index_code(status), worktree_code(status));
    if x == ' ' && y == ' ' {
        return None;
    }

    let renamed_from = entry
        .head_to_index()
        .filter(|_| status.is_index_renamed())
        .and_then(|delta| delta.old_file().path().map(|p| p.to_string_lossy().into_owned()));

    Some(match renamed_from {
        Some(old) => format!("{x}{y} {old} -> {path}"),
        None => format!("{x}{y} {path}"),
    })
}

fn index_code(status: Status) -> char {
    if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else if status.is_index_typechange() {
        'T'
    } else {
        ' '
    }
}

fn worktree_code(status: Status) -> char {
    if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_typechange() {
        'T'
    } else if status.is_wt_renamed() {
        'R'
    } else {
        ' '
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(index_code(Status::INDEX_NEW), 'A');
        assert_eq!(index_code(Status::INDEX_MODIFIED | Status::WT_MODIFIED), 'M');
        assert_eq!(worktree_code(Status::INDEX_MODIFIED | Status::WT_MODIFIED), 'M');
        assert_eq!(worktree_code(Status::WT_DELETED), 'D');
        assert_eq!(index_code(Status::WT_DELETED), ' ');
        assert_eq!(worktree_code(Status::CURRENT), ' ');
    }
}
