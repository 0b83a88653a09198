//! Repository and directory records produced by a scan.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::RepositoryMetadata;

/// Number of hex characters kept from the path hash.
const ID_LEN: usize = 16;

/// Stable identifier derived from a resolved absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    /// Derive the id for a path. The path should already be resolved.
    pub fn from_path(path: &Path) -> Self {
        let hash = blake3::hash(path.as_os_str().as_encoded_bytes());
        let hex = hash.to_hex();
        Self(hex.as_str()[..ID_LEN].to_string())
    }

    /// Wrap an id received from a caller.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A discovered git repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Stable id of the resolved path.
    pub id: RepoId,
    /// Directory basename.
    pub name: String,
    /// Resolved absolute path.
    pub path: PathBuf,
    /// First line of the repository description, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Directory modification time, if it could be read.
    pub last_modified: Option<DateTime<Utc>>,
    /// Git details merged in from a metadata collaborator.
    #[serde(flatten)]
    pub git: Option<RepositoryMetadata>,
}

impl RepositoryRecord {
    /// Create a record without git details.
    pub fn new(
        path: PathBuf,
        description: Option<String>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: RepoId::from_path(&path),
            name: basename(&path),
            path,
            description,
            last_modified,
            git: None,
        }
    }

    /// Attach collaborator metadata. Record fields are never overwritten.
    pub fn with_metadata(mut self, metadata: RepositoryMetadata) -> Self {
        self.git = Some(metadata);
        self
    }
}

/// A top-level directory that is not a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Stable id of the resolved path.
    pub id: RepoId,
    /// Directory basename.
    pub name: String,
    /// Resolved absolute path.
    pub path: PathBuf,
    /// Directory modification time, if it could be read.
    pub last_modified: Option<DateTime<Utc>>,
}

impl DirectoryRecord {
    /// Create a directory record.
    pub fn new(path: PathBuf, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            id: RepoId::from_path(&path),
            name: basename(&path),
            path,
            last_modified,
        }
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::RepoStatus;

    #[test]
    fn test_repo_id_is_stable() {
        let a = RepoId::from_path(Path::new("/home/user/code/app"));
        let b = RepoId::from_path(Path::new("/home/user/code/app"));
        let c = RepoId::from_path(Path::new("/home/user/code/lib"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), ID_LEN);
        assert!(a.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_name_from_path() {
        let record = RepositoryRecord::new(PathBuf::from("/r/a"), None, None);
        assert_eq!(record.name, "a");
        assert_eq!(record.id, RepoId::from_path(Path::new("/r/a")));

        let dir = DirectoryRecord::new(PathBuf::from("/r/b"), None);
        assert_eq!(dir.name, "b");
    }

    #[test]
    fn test_metadata_merge_is_additive() {
        let record = RepositoryRecord::new(PathBuf::from("/r/a"), Some("demo".into()), None);
        let merged = record
            .clone()
            .with_metadata(RepositoryMetadata::failed("boom"));

        assert_eq!(merged.id, record.id);
        assert_eq!(merged.name, record.name);
        assert_eq!(merged.description.as_deref(), Some("demo"));
        assert_eq!(merged.git.as_ref().map(|g| g.status), Some(RepoStatus::Error));

        let json = serde_json::to_value(&merged).unwrap();
        assert_eq!(json["name"], "a");
        assert_eq!(json["status"], "Error");
        assert_eq!(json["current_branch"], "Unknown");
    }

    #[test]
    fn test_record_without_metadata_deserializes() {
        let json = r#"{"id":"abc","name":"a","path":"/r/a","last_modified":null}"#;
        let record: RepositoryRecord = serde_json::from_str(json).unwrap();
        assert!(record.git.is_none());
        assert!(record.description.is_none());
    }
}
