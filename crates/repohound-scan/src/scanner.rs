//! Parallel repository discovery.
//!
//! Every directory node fans its eligible children out onto a shared rayon
//! pool and joins on all of them before returning, so no task outlives the
//! call that spawned it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use repohound_core::{ScanConfig, ScanError, ScanWarning};

use crate::exclusion::{ExclusionPolicy, Matcher, MatcherChain};
use crate::progress::{ProgressSink, ScanUpdate};

/// Name of the git metadata directory that marks a repository root.
const GIT_DIR: &str = ".git";

/// Directories at this depth or shallower emit an `Entering` update.
const REPORT_DEPTH: u32 = 2;

/// Raw result of walking a tree.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Resolved root that was scanned.
    pub root: PathBuf,
    /// Repository roots, in discovery order.
    pub repositories: Vec<PathBuf>,
    /// Immediate root children that are neither repositories nor high-level skips.
    pub directories: Vec<PathBuf>,
    /// Recovered problems.
    pub warnings: Vec<ScanWarning>,
    /// Time spent walking.
    pub duration: Duration,
}

/// What one directory node contributes to the result.
#[derive(Debug, Default)]
struct Branch {
    repositories: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    warnings: Vec<ScanWarning>,
}

impl Branch {
    fn absorb(&mut self, other: Branch) {
        self.repositories.extend(other.repositories);
        self.directories.extend(other.directories);
        self.warnings.extend(other.warnings);
    }
}

/// Per-scan state shared by every worker.
struct Walk<'a> {
    config: &'a ScanConfig,
    policy: &'a ExclusionPolicy,
    max_depth: u32,
    sink: &'a dyn ProgressSink,
}

/// Scanner that discovers git repositories below a root.
pub struct RepoScanner {
    config: ScanConfig,
    policy: ExclusionPolicy,
    pool: rayon::ThreadPool,
}

impl RepoScanner {
    /// Create a scanner with its own worker pool.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("repohound-scan-{i}"))
            .build()
            .map_err(|e| ScanError::Other {
                message: format!("Could not start scan workers: {e}"),
            })?;

        Ok(Self {
            policy: ExclusionPolicy::new(&config),
            config,
            pool,
        })
    }

    /// Configuration this scanner was built with.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Number of worker threads in the pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Scan the configured root to the configured depth.
    pub fn scan(&self, sink: &dyn ProgressSink) -> Result<ScanOutcome, ScanError> {
        self.scan_with(&self.config.root, self.config.max_depth, sink)
    }

    /// Scan `root` to `max_depth`.
    ///
    /// Only a missing or non-directory root fails the scan; everything below
    /// the root is recovered and reported as warnings.
    pub fn scan_with(
        &self,
        root: &Path,
        max_depth: u32,
        sink: &dyn ProgressSink,
    ) -> Result<ScanOutcome, ScanError> {
        let start = Instant::now();
        let root = root.canonicalize().map_err(|e| ScanError::io(root, e))?;

        if !root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }

        let walk = Walk {
            config: &self.config,
            policy: &self.policy,
            max_depth,
            sink,
        };

        let branch = self
            .pool
            .install(|| walk.directory(&root, 0, &MatcherChain::empty()))?;

        Ok(ScanOutcome {
            root,
            repositories: branch.repositories,
            directories: branch.directories,
            warnings: branch.warnings,
            duration: start.elapsed(),
        })
    }
}

impl Walk<'_> {
    /// Scan one directory and, unless it is a repository, its eligible children.
    fn directory(&self, dir: &Path, depth: u32, inherited: &MatcherChain) -> Result<Branch, ScanError> {
        if depth <= REPORT_DEPTH {
            tracing::info!(path = %dir.display(), depth, "scanning directory");
            self.sink.emit(ScanUpdate::Entering {
                path: dir.to_path_buf(),
                depth,
            });
        } else {
            tracing::debug!(path = %dir.display(), depth, "scanning directory");
        }

        let mut branch = Branch::default();
        if depth > self.max_depth {
            tracing::debug!(path = %dir.display(), "max depth reached");
            return Ok(branch);
        }

        let metadata = fs::metadata(dir).map_err(|e| ScanError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }

        if dir.join(GIT_DIR).is_dir() {
            tracing::debug!(path = %dir.display(), "found git repository");
            self.sink.emit(ScanUpdate::RepositoryFound {
                path: dir.to_path_buf(),
                depth,
            });
            branch.repositories.push(dir.to_path_buf());
            return Ok(branch);
        }

        if depth == 1 {
            let skip = dir
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| self.config.is_high_level(name));
            if skip {
                tracing::debug!(path = %dir.display(), "skipping high-level directory record");
            } else {
                tracing::debug!(path = %dir.display(), "found non-git directory");
                branch.directories.push(dir.to_path_buf());
            }
        }

        let current = self.policy.matcher_for(dir, &mut branch.warnings);

        let children = match self.children(dir, inherited.matcher(), current.as_deref(), &mut branch) {
            Ok(children) => children,
            Err(err) if err.is_access_error() => {
                tracing::warn!(path = %dir.display(), error = %err, "could not list directory");
                branch.warnings.push(match err {
                    ScanError::PermissionDenied { path } => ScanWarning::permission_denied(path),
                    other => ScanWarning::vanished(other.path().cloned().unwrap_or_default()),
                });
                return Ok(branch);
            }
            Err(err) => return Err(err),
        };

        if children.is_empty() {
            return Ok(branch);
        }
        if depth + 1 > self.max_depth {
            tracing::debug!(path = %dir.display(), "max depth reached, not descending");
            return Ok(branch);
        }

        let chain = inherited.descend(current);
        let results: Vec<(PathBuf, Result<Branch, ScanError>)> = children
            .into_par_iter()
            .map(|child| {
                let result = self.directory(&child, depth + 1, &chain);
                (child, result)
            })
            .collect();

        for (child, result) in results {
            match result {
                Ok(sub) => branch.absorb(sub),
                Err(err) => {
                    tracing::error!(path = %child.display(), error = %err, "subdirectory scan failed");
                    self.sink.emit(ScanUpdate::Failed {
                        path: child.clone(),
                        message: err.to_string(),
                    });
                    branch.warnings.push(ScanWarning::child_failed(child, &err));
                }
            }
        }

        Ok(branch)
    }

    /// List the child directories of `dir` that survive exclusion.
    fn children(
        &self,
        dir: &Path,
        parent: Option<&Matcher>,
        current: Option<&Matcher>,
        branch: &mut Branch,
    ) -> Result<Vec<PathBuf>, ScanError> {
        let mut children = Vec::new();

        for entry in fs::read_dir(dir).map_err(|e| ScanError::io(dir, e))? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "could not read directory entry");
                    branch.warnings.push(ScanWarning::read_error(dir, &err));
                    continue;
                }
            };

            let path = entry.path();
            // Symlinks are followed; the depth limit bounds any cycle.
            let is_dir = match entry.file_type() {
                Ok(file_type) if file_type.is_symlink() => fs::metadata(&path).is_ok_and(|m| m.is_dir()),
                Ok(file_type) => file_type.is_dir(),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not read file type");
                    branch.warnings.push(ScanWarning::read_error(&path, &err));
                    continue;
                }
            };
            if !is_dir {
                continue;
            }

            if self.policy.should_ignore(&path, parent, current) {
                tracing::debug!(path = %path.display(), "ignoring directory due to exclusion or ignore file");
                continue;
            }
            children.push(path);
        }

        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn mkrepo(path: &Path) {
        fs::create_dir_all(path.join(GIT_DIR)).unwrap();
    }

    fn sorted(paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut paths = paths.to_vec();
        paths.sort();
        paths
    }

    #[test]
    fn test_top_level_classification() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        mkrepo(&root.join("a"));
        fs::create_dir(root.join("b")).unwrap();
        mkrepo(&root.join("c"));

        let scanner = RepoScanner::new(ScanConfig::new(&root)).unwrap();
        let outcome = scanner.scan(&NoProgress).unwrap();

        assert_eq!(outcome.root, root);
        assert_eq!(sorted(&outcome.repositories), vec![root.join("a"), root.join("c")]);
        assert_eq!(outcome.directories, vec![root.join("b")]);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_root_repository_is_pruned() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        mkrepo(&root);
        mkrepo(&root.join("submodule"));

        let scanner = RepoScanner::new(ScanConfig::new(&root)).unwrap();
        let outcome = scanner.scan(&NoProgress).unwrap();

        assert_eq!(outcome.repositories, vec![root.clone()]);
        assert!(outcome.directories.is_empty());
    }

    #[test]
    fn test_depth_boundary_is_inclusive() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        mkrepo(&root.join("one").join("two"));
        mkrepo(&root.join("one").join("deep").join("three"));

        let config = ScanConfig::builder().root(&root).max_depth(2u32).build().unwrap();
        let outcome = RepoScanner::new(config).unwrap().scan(&NoProgress).unwrap();

        assert_eq!(outcome.repositories, vec![root.join("one").join("two")]);
    }

    #[test]
    fn test_excluded_names_not_entered() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        mkrepo(&root.join("node_modules").join("pkg"));
        mkrepo(&root.join("src").join("node_modules").join("dep"));
        mkrepo(&root.join("src").join("app"));

        let outcome = RepoScanner::new(ScanConfig::new(&root))
            .unwrap()
            .scan(&NoProgress)
            .unwrap();

        assert_eq!(outcome.repositories, vec![root.join("src").join("app")]);
        assert_eq!(outcome.directories, vec![root.join("src")]);
    }

    #[test]
    fn test_high_level_skip_still_traversed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        mkrepo(&root.join("x").join("inner"));

        let config = ScanConfig::builder()
            .root(&root)
            .high_level_skip(BTreeSet::from(["x".to_string()]))
            .build()
            .unwrap();
        let outcome = RepoScanner::new(config).unwrap().scan(&NoProgress).unwrap();

        assert!(outcome.directories.is_empty());
        assert_eq!(outcome.repositories, vec![root.join("x").join("inner")]);
    }

    #[test]
    fn test_gitignore_prunes_children() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::write(root.join(".gitignore"), "scratch/\n").unwrap();
        mkrepo(&root.join("scratch").join("tmp-repo"));
        mkrepo(&root.join("work").join("scratch").join("nested"));
        mkrepo(&root.join("work").join("kept"));

        let outcome = RepoScanner::new(ScanConfig::new(&root))
            .unwrap()
            .scan(&NoProgress)
            .unwrap();

        assert_eq!(outcome.repositories, vec![root.join("work").join("kept")]);
    }

    #[test]
    fn test_child_ignore_file_overrides_parent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::write(root.join(".gitignore"), "scratch/\n").unwrap();
        fs::create_dir_all(root.join("work")).unwrap();
        fs::write(root.join("work").join(".gitignore"), "other/\n").unwrap();
        mkrepo(&root.join("work").join("scratch").join("hidden"));
        mkrepo(&root.join("work").join("sub").join("scratch").join("visible"));

        let outcome = RepoScanner::new(ScanConfig::new(&root))
            .unwrap()
            .scan(&NoProgress)
            .unwrap();

        // The root matcher still applies to work's own children, but not to
        // grandchildren once work's ignore file takes over.
        assert_eq!(
            outcome.repositories,
            vec![root.join("work").join("sub").join("scratch").join("visible")]
        );
    }

    #[test]
    fn test_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let scanner = RepoScanner::new(ScanConfig::new(temp.path())).unwrap();
        let err = scanner
            .scan_with(&temp.path().join("missing"), 10, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[test]
    fn test_file_root_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let scanner = RepoScanner::new(ScanConfig::new(&file)).unwrap();
        assert!(matches!(
            scanner.scan(&NoProgress),
            Err(ScanError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_empty_root_rejected() {
        assert!(matches!(
            RepoScanner::new(ScanConfig::new("")),
            Err(ScanError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_pool_size() {
        let config = ScanConfig::builder().root("/").threads(3usize).build().unwrap();
        assert_eq!(RepoScanner::new(config).unwrap().threads(), 3);
    }
}
