//! Scan report container and summary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::record::{DirectoryRecord, RepoId, RepositoryRecord};

/// Counts describing a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub repositories: usize,
    pub directories: usize,
    pub warnings: usize,
}

/// The persisted result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// When the scan finished.
    pub scan_time: DateTime<Utc>,
    /// Wall-clock duration of the scan.
    pub scan_duration_seconds: f64,
    /// Root that was scanned.
    pub scan_directory: PathBuf,
    /// Discovered repositories, sorted by name.
    pub git_repositories: Vec<RepositoryRecord>,
    /// Top-level non-git directories, sorted by name.
    pub non_git_directories: Vec<DirectoryRecord>,
    /// Non-fatal problems encountered along the way.
    #[serde(default)]
    pub warnings: Vec<ScanWarning>,
    /// Configuration the scan ran with.
    pub config_used: ScanConfig,
}

impl ScanReport {
    /// Create a report, sorting both record lists by name then path.
    pub fn new(
        scan_directory: PathBuf,
        mut git_repositories: Vec<RepositoryRecord>,
        mut non_git_directories: Vec<DirectoryRecord>,
        warnings: Vec<ScanWarning>,
        scan_duration: Duration,
        config_used: ScanConfig,
    ) -> Self {
        git_repositories.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        non_git_directories.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));

        Self {
            scan_time: Utc::now(),
            scan_duration_seconds: scan_duration.as_secs_f64(),
            scan_directory,
            git_repositories,
            non_git_directories,
            warnings,
            config_used,
        }
    }

    /// Get the counts for this report.
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            repositories: self.git_repositories.len(),
            directories: self.non_git_directories.len(),
            warnings: self.warnings.len(),
        }
    }

    /// Find a repository by id.
    pub fn repository(&self, id: &RepoId) -> Option<&RepositoryRecord> {
        self.git_repositories.iter().find(|r| &r.id == id)
    }

    /// Whether this report was produced for `root`.
    pub fn covers(&self, root: &Path) -> bool {
        self.scan_directory == root
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
