//! Per-directory exclusion rules.
//!
//! A directory's ignore-pattern file compiles into a [`Matcher`]. The matcher
//! in effect for a subtree is carried down as a [`MatcherChain`]: a child
//! directory with its own ignore file *replaces* the inherited matcher rather
//! than adding to it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use repohound_core::{ScanConfig, ScanWarning, WarningKind};

/// Compiled ignore patterns from one directory's ignore file.
#[derive(Debug)]
pub struct Matcher {
    dir: PathBuf,
    rules: Gitignore,
}

impl Matcher {
    /// Compile the ignore file `file_name` inside `dir`.
    ///
    /// Returns `Ok(None)` when the file does not exist. Any parse or read
    /// error is returned as a warning; callers treat it as no matcher.
    pub fn load(dir: &Path, file_name: &str) -> Result<Option<Self>, ScanWarning> {
        let file = dir.join(file_name);
        if !file.is_file() {
            return Ok(None);
        }

        let mut builder = GitignoreBuilder::new(dir);
        if let Some(err) = builder.add(&file) {
            return Err(parse_warning(&file, &err));
        }
        let rules = builder.build().map_err(|err| parse_warning(&file, &err))?;

        Ok(Some(Self {
            dir: dir.to_path_buf(),
            rules,
        }))
    }

    /// Compile a matcher from in-memory pattern lines rooted at `dir`.
    pub fn from_lines<'a>(
        dir: &Path,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(dir);
        for line in lines {
            builder.add_line(None, line)?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            rules: builder.build()?,
        })
    }

    /// Directory the patterns are relative to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory at `path` is ignored by these patterns.
    pub fn matches_dir(&self, path: &Path) -> bool {
        self.rules.matched(path, true).is_ignore()
    }
}

fn parse_warning(file: &Path, err: &ignore::Error) -> ScanWarning {
    ScanWarning::new(
        file,
        format!("Could not parse ignore file at {}: {err}", file.display()),
        WarningKind::IgnoreParse,
    )
}

/// The matcher in effect at one level of the walk.
///
/// Cheap to clone and never mutated once built.
#[derive(Debug, Clone, Default)]
pub struct MatcherChain {
    effective: Option<Arc<Matcher>>,
}

impl MatcherChain {
    /// A chain with no matcher, used at the scan root.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The chain handed to children of a directory whose own matcher is `local`.
    ///
    /// `local` overrides the inherited matcher when present.
    pub fn descend(&self, local: Option<Arc<Matcher>>) -> Self {
        Self {
            effective: local.or_else(|| self.effective.clone()),
        }
    }

    /// The effective matcher, if any.
    pub fn matcher(&self) -> Option<&Matcher> {
        self.effective.as_deref()
    }
}

/// Decide whether a candidate directory is skipped.
///
/// A path is ignored iff the parent matcher matches it, the current
/// directory's matcher matches it, or its basename is exactly in `excluded`.
pub fn should_ignore(
    path: &Path,
    parent: Option<&Matcher>,
    current: Option<&Matcher>,
    excluded: &BTreeSet<String>,
) -> bool {
    if parent.is_some_and(|m| m.matches_dir(path)) {
        return true;
    }
    if current.is_some_and(|m| m.matches_dir(path)) {
        return true;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| excluded.contains(name))
}

/// Exclusion rules derived from a scan configuration.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    excluded_names: BTreeSet<String>,
    ignore_file_name: String,
}

impl ExclusionPolicy {
    /// Create a policy from scan configuration.
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            excluded_names: config.excluded_names.clone(),
            ignore_file_name: config.ignore_file_name.clone(),
        }
    }

    /// Load the matcher for `dir`, logging and recording a warning on failure.
    pub fn matcher_for(&self, dir: &Path, warnings: &mut Vec<ScanWarning>) -> Option<Arc<Matcher>> {
        match Matcher::load(dir, &self.ignore_file_name) {
            Ok(matcher) => matcher.map(Arc::new),
            Err(warning) => {
                tracing::warn!(path = %warning.path.display(), "{}", warning.message);
                warnings.push(warning);
                None
            }
        }
    }

    /// Whether `path` is skipped given the inherited and current matchers.
    pub fn should_ignore(
        &self,
        path: &Path,
        parent: Option<&Matcher>,
        current: Option<&Matcher>,
    ) -> bool {
        should_ignore(path, parent, current, &self.excluded_names)
    }
}
