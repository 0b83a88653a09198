//! Scan configuration and persisted settings.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Default maximum traversal depth below the scan root.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Name of the per-directory ignore-pattern file.
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// Directory basenames skipped everywhere unless configured otherwise.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    "node_modules",
    ".git",
    "venv",
    "__pycache__",
    "dist",
    "build",
    ".terraform",
    "modules",
    ".venv",
    "env",
];

/// Configuration for a repository scan.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root directory to scan.
    pub root: PathBuf,

    /// Maximum depth to traverse. Directories at exactly this depth are still scanned.
    #[builder(default = "DEFAULT_MAX_DEPTH")]
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Directory basenames that are never entered, at any depth.
    #[builder(default = "default_excluded_names()")]
    #[serde(default = "default_excluded_names")]
    pub excluded_names: BTreeSet<String>,

    /// Basenames of immediate root children that are not reported as
    /// non-git directories. They are still traversed.
    #[builder(default)]
    #[serde(default)]
    pub high_level_skip: BTreeSet<String>,

    /// File name of the per-directory ignore-pattern file.
    #[builder(default = "DEFAULT_IGNORE_FILE.to_string()")]
    #[serde(default = "default_ignore_file")]
    pub ignore_file_name: String,

    /// Number of worker threads (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_ignore_file() -> String {
    DEFAULT_IGNORE_FILE.to_string()
}

fn default_excluded_names() -> BTreeSet<String> {
    DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect()
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                Err("Root path cannot be empty".to_string())
            }
            Some(_) => Ok(()),
            None => Err("Root path is required".to_string()),
        }
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config for scanning a path with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            excluded_names: default_excluded_names(),
            high_level_skip: BTreeSet::new(),
            ignore_file_name: default_ignore_file(),
            threads: 0,
        }
    }

    /// Check a config that was not built through the builder.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.root.as_os_str().is_empty() {
            return Err(ScanError::InvalidConfig {
                message: "Root path cannot be empty".to_string(),
            });
        }
        if self.ignore_file_name.is_empty() || self.ignore_file_name.contains(['/', '\\']) {
            return Err(ScanError::InvalidConfig {
                message: format!("Ignore file name must be a plain file name: {:?}", self.ignore_file_name),
            });
        }
        Ok(())
    }

    /// Whether a basename is on the exclusion list. Exact match only.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_names.contains(name)
    }

    /// Whether a basename is on the high-level skip list.
    pub fn is_high_level(&self, name: &str) -> bool {
        self.high_level_skip.contains(name)
    }
}

impl From<ScanConfigBuilderError> for ScanError {
    fn from(err: ScanConfigBuilderError) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Persistent settings stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory scanned when no explicit root is given.
    pub scan_directory: PathBuf,
    /// Maximum scan depth.
    pub max_depth: u32,
    /// Enables debug logging and result tables.
    pub verbose: bool,
    /// Basenames excluded at every depth.
    pub excluded_dirs: BTreeSet<String>,
    /// Top-level basenames never reported as non-git directories.
    pub high_level_dirs: BTreeSet<String>,
    /// Worker threads for scanning (0 = auto-detect).
    pub threads: usize,
    /// Where scan results are persisted. Defaults to the data directory.
    pub results_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_directory: dirs::home_dir()
                .map(|home| home.join("code"))
                .unwrap_or_else(|| PathBuf::from("code")),
            max_depth: DEFAULT_MAX_DEPTH,
            verbose: false,
            excluded_dirs: default_excluded_names(),
            high_level_dirs: BTreeSet::new(),
            threads: 0,
            results_file: None,
        }
    }
}

impl Settings {
    /// Get the default config file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("repohound").join("config.toml"))
    }

    /// Default location of the persisted scan results.
    pub fn default_results_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("data"))
            .join("repohound")
            .join("git_repos_scan.json")
    }

    /// Load settings from `path`, writing defaults if the file does not exist.
    ///
    /// An unreadable or malformed file is logged and replaced by defaults in
    /// memory only; the file on disk is left untouched.
    pub fn load_or_init(path: &Path) -> Self {
        if !path.exists() {
            let settings = Self::default();
            match settings.save_to(path) {
                Ok(()) => tracing::info!(path = %path.display(), "created default configuration"),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not write default configuration")
                }
            }
            return settings;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => settings,
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "invalid configuration, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "could not read configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Save settings to `path`.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(path, content)
    }

    /// Resolved results file location.
    pub fn results_path(&self) -> PathBuf {
        self.results_file
            .clone()
            .unwrap_or_else(Self::default_results_path)
    }

    /// Build the scan configuration these settings describe.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            root: self.scan_directory.clone(),
            max_depth: self.max_depth,
            excluded_names: self.excluded_dirs.clone(),
            high_level_skip: self.high_level_dirs.clone(),
            ignore_file_name: default_ignore_file(),
            threads: self.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .root("/home/user/code")
            .max_depth(3u32)
            .threads(4usize)
            .high_level_skip(BTreeSet::from(["Workshop".to_string()]))
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user/code"));
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.threads, 4);
        assert!(config.is_high_level("Workshop"));
        assert!(config.is_excluded("node_modules"));
        assert_eq!(config.ignore_file_name, ".gitignore");
    }

    #[test]
    fn test_builder_requires_root() {
        assert!(ScanConfig::builder().build().is_err());
        assert!(ScanConfig::builder().root("").build().is_err());
    }

    #[test]
    fn test_validate_reports_invalid_config() {
        assert!(ScanConfig::new("/r").validate().is_ok());
        assert!(matches!(
            ScanConfig::new("").validate(),
            Err(ScanError::InvalidConfig { .. })
        ));

        let mut config = ScanConfig::new("/r");
        config.ignore_file_name = "nested/.gitignore".to_string();
        assert!(matches!(config.validate(), Err(ScanError::InvalidConfig { .. })));

        let err: ScanError = ScanConfig::builder().build().unwrap_err().into();
        assert!(err.to_string().starts_with("Invalid configuration: "));
    }

    #[test]
    fn test_exclusion_is_exact_basename() {
        let config = ScanConfig::new("/r");
        assert!(config.is_excluded("build"));
        assert!(!config.is_excluded("build2"));
        assert!(!config.is_excluded("Build"));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: ScanConfig = serde_json::from_str(r#"{"root": "/r"}"#).unwrap();
        assert_eq!(config, ScanConfig::new("/r"));
    }

    #[test]
    fn test_settings_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let settings = Settings::load_or_init(&path);
        assert!(path.exists());
        assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);

        let reloaded = Settings::load_or_init(&path);
        assert_eq!(settings, reloaded);
    }

    #[test]
    fn test_settings_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "scan_directory = \"/srv/src\"\nmax_depth = 4\n").unwrap();

        let settings = Settings::load_or_init(&path);
        assert_eq!(settings.scan_directory, PathBuf::from("/srv/src"));
        assert_eq!(settings.max_depth, 4);
        assert!(settings.excluded_dirs.contains("node_modules"));

        let config = settings.scan_config();
        assert_eq!(config.root, PathBuf::from("/srv/src"));
        assert_eq!(config.max_depth, 4);
    }

    #[test]
    fn test_settings_malformed_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "max_depth = \"deep\"").unwrap();

        let settings = Settings::load_or_init(&path);
        assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);
    }
}
