//! Persistence of scan reports.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use repohound_core::ScanReport;

use crate::error::StoreError;

/// Where finished scan reports are kept.
pub trait ResultStore: Send + Sync {
    /// The most recently saved report, if one can be read.
    fn load(&self) -> Option<ScanReport>;

    /// Replace the stored report.
    fn save(&self, report: &ScanReport) -> Result<(), StoreError>;
}

/// Stores the report as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonResultStore {
    path: PathBuf,
}

impl JsonResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ResultStore for JsonResultStore {
    fn load(&self) -> Option<ScanReport> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "could not read results file");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "could not parse results file");
                None
            }
        }
    }

    fn save(&self, report: &ScanReport) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(report)?;
        // Write beside the target and rename so readers never see a partial file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| self.io_error(e))?;
        fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), "saved scan results");
        Ok(())
    }
}

/// Keeps the report in memory only.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    report: Mutex<Option<ScanReport>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(report: ScanReport) -> Self {
        Self {
            report: Mutex::new(Some(report)),
        }
    }
}

impl ResultStore for MemoryResultStore {
    fn load(&self) -> Option<ScanReport> {
        self.report.lock().clone()
    }

    fn save(&self, report: &ScanReport) -> Result<(), StoreError> {
        *self.report.lock() = Some(report.clone());
        Ok(())
    }
}
