//! Concurrent git repository discovery for repohound.
//!
//! # Overview
//!
//! `repohound-scan` walks a directory tree looking for repository roots
//! (directories that directly contain a `.git` directory). Key features:
//!
//! - **Parallel traversal** on a bounded rayon pool, joined per directory
//! - **Pruning** at repository roots, excluded basenames and ignore files
//! - **Partial results** when parts of the tree are unreadable
//! - **Progress updates** through a [`ProgressSink`]
//!
//! # Example
//!
//! ```rust,no_run
//! use repohound_scan::{NoProgress, RepoScanner, ScanConfig, build_report};
//!
//! let scanner = RepoScanner::new(ScanConfig::new("/home/user/code")).unwrap();
//! let outcome = scanner.scan(&NoProgress).unwrap();
//! let report = build_report(outcome, scanner.config(), None);
//!
//! println!("Found {} repositories", report.git_repositories.len());
//! ```

mod exclusion;
mod progress;
mod records;
mod scanner;

pub use exclusion::{ExclusionPolicy, Matcher, MatcherChain, should_ignore};
pub use progress::{NoProgress, ProgressSink, ScanUpdate};
pub use records::{
    build_report, describe_directory, describe_repository, last_modified, merge_metadata,
    read_description,
};
pub use scanner::{RepoScanner, ScanOutcome};

// Re-export core types for convenience
pub use repohound_core::{
    DirectoryRecord, RepoId, RepositoryRecord, ScanConfig, ScanError, ScanReport, ScanWarning,
    WarningKind,
};
