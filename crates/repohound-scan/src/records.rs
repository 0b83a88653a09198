//! Turning scan outcomes into records and merging git metadata.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use repohound_core::{
    DirectoryRecord, MetadataCollaborator, RepositoryRecord, ScanConfig, ScanReport,
};

use crate::scanner::ScanOutcome;

/// Git's placeholder text in a fresh `.git/description`.
const PLACEHOLDER_DESCRIPTION: &str = "Unnamed repository";

/// Read the first line of `<repo>/.git/description`.
///
/// Returns `None` if the file is missing, empty, or still holds git's placeholder.
pub fn read_description(repo: &Path) -> Option<String> {
    let bytes = fs::read(repo.join(".git").join("description")).ok()?;
    let text = String::from_utf8_lossy(&bytes);
    let line = text.lines().next()?.trim();

    if line.is_empty() || line.starts_with(PLACEHOLDER_DESCRIPTION) {
        None
    } else {
        Some(line.to_string())
    }
}

/// Modification time of `path`, logging when it cannot be read.
pub fn last_modified(path: &Path) -> Option<DateTime<Utc>> {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => Some(DateTime::<Utc>::from(time)),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not get stats");
            None
        }
    }
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Build the record for a repository root.
pub fn describe_repository(path: &Path) -> RepositoryRecord {
    let path = resolve(path);
    let description = read_description(&path);
    let modified = last_modified(&path);
    RepositoryRecord::new(path, description, modified)
}

/// Build the record for a top-level non-git directory.
pub fn describe_directory(path: &Path) -> DirectoryRecord {
    let path = resolve(path);
    let modified = last_modified(&path);
    DirectoryRecord::new(path, modified)
}

/// Attach collaborator metadata to every record.
///
/// Lookups run in parallel. A failed lookup yields `Error`-status metadata
/// for that record only.
pub fn merge_metadata(
    records: Vec<RepositoryRecord>,
    collaborator: &dyn MetadataCollaborator,
) -> Vec<RepositoryRecord> {
    records
        .into_par_iter()
        .map(|record| {
            let metadata = collaborator.metadata_or_failed(&record.path);
            record.with_metadata(metadata)
        })
        .collect()
}

/// Assemble a report from a scan outcome.
///
/// When a collaborator is given, its metadata is merged into every repository.
pub fn build_report(
    outcome: ScanOutcome,
    config: &ScanConfig,
    collaborator: Option<&dyn MetadataCollaborator>,
) -> ScanReport {
    let repositories: Vec<RepositoryRecord> = outcome
        .repositories
        .par_iter()
        .map(|p| describe_repository(p))
        .collect();
    let repositories = match collaborator {
        Some(collaborator) => merge_metadata(repositories, collaborator),
        None => repositories,
    };
    let directories = outcome
        .directories
        .iter()
        .map(|p| describe_directory(p))
        .collect();

    ScanReport::new(
        outcome.root,
        repositories,
        directories,
        outcome.warnings,
        outcome.duration,
        config.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use repohound_core::{
        MetadataError, PullOutcome, PullSink, RepoStatus, RepositoryMetadata,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    struct FakeCollaborator;

    impl MetadataCollaborator for FakeCollaborator {
        fn fetch_metadata(&self, path: &Path) -> Result<RepositoryMetadata, MetadataError> {
            if path.ends_with("broken") {
                return Err(MetadataError::git("corrupt index"));
            }
            let mut meta = RepositoryMetadata::failed("");
            meta.current_branch = "main".to_string();
            meta.status = RepoStatus::Clean;
            meta.error = None;
            Ok(meta)
        }

        fn pull(&self, _path: &Path, _sink: &PullSink<'_>) -> PullOutcome {
            PullOutcome::failed("unsupported")
        }

        fn status(&self, _path: &Path) -> Result<String, MetadataError> {
            Ok("Clean".to_string())
        }
    }

    #[test]
    fn test_description_placeholder_ignored() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path();
        fs::create_dir(repo.join(".git")).unwrap();

        assert_eq!(read_description(repo), None);

        fs::write(
            repo.join(".git").join("description"),
            "Unnamed repository; edit this file 'description' to name the repository.\n",
        )
        .unwrap();
        assert_eq!(read_description(repo), None);

        fs::write(repo.join(".git").join("description"), "  Billing service \nsecond line\n").unwrap();
        assert_eq!(read_description(repo).as_deref(), Some("Billing service"));
    }

    #[test]
    fn test_description_lossy_utf8() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git").join("description"), b"caf\xe9 tools\n").unwrap();

        let description = read_description(temp.path()).unwrap();
        assert!(description.starts_with("caf"));
        assert!(description.ends_with(" tools"));
    }

    #[test]
    fn test_describe_repository() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("api");
        fs::create_dir_all(repo.join(".git")).unwrap();

        let record = describe_repository(&repo);
        assert_eq!(record.name, "api");
        assert_eq!(record.path, repo.canonicalize().unwrap());
        assert!(record.last_modified.is_some());
        assert!(record.git.is_none());
    }

    #[test]
    fn test_merge_isolates_failures() {
        let records = vec![
            RepositoryRecord::new(PathBuf::from("/r/ok"), None, None),
            RepositoryRecord::new(PathBuf::from("/r/broken"), None, None),
        ];
        let merged = merge_metadata(records, &FakeCollaborator);

        assert_eq!(merged.len(), 2);
        let ok = merged.iter().find(|r| r.name == "ok").unwrap();
        assert_eq!(ok.git.as_ref().unwrap().status, RepoStatus::Clean);
        let broken = merged.iter().find(|r| r.name == "broken").unwrap();
        let meta = broken.git.as_ref().unwrap();
        assert_eq!(meta.status, RepoStatus::Error);
        assert_eq!(meta.error.as_deref(), Some("corrupt index"));
        assert_eq!(broken.path, PathBuf::from("/r/broken"));
    }

    #[test]
    fn test_build_report() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("b").join(".git")).unwrap();
        fs::create_dir_all(root.join("a").join(".git")).unwrap();
        fs::create_dir_all(root.join("plain")).unwrap();

        let outcome = ScanOutcome {
            root: root.clone(),
            repositories: vec![root.join("b"), root.join("a")],
            directories: vec![root.join("plain")],
            warnings: Vec::new(),
            duration: Duration::from_millis(10),
        };
        let report = build_report(outcome, &ScanConfig::new(&root), Some(&FakeCollaborator));

        assert_eq!(report.scan_directory, root);
        let names: Vec<_> = report.git_repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(report.git_repositories.iter().all(|r| r.git.is_some()));
        assert_eq!(report.non_git_directories[0].name, "plain");
    }
}
