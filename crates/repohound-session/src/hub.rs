//! Running scans and pulls in the background.
//!
//! The hub ties the pieces together: it claims a session, spawns a blocking
//! worker, relays the worker's progress onto the bus and persists results.
//! Workers are never cancelled; dropping every subscriber leaves them running.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use repohound_core::{
    MetadataCollaborator, PullOutcome, PullStatus, PullUpdate, RepoId, RepositoryRecord,
    ScanConfig, ScanReport,
};
use repohound_scan::{RepoScanner, ScanUpdate, build_report};

use crate::bus::{ProgressBus, Subscription};
use crate::error::{HubError, SessionError};
use crate::event::{EventDetail, EventKind, ProgressEvent};
use crate::session::{OperationKind, SessionGuard, SessionManager, SessionSnapshot};
use crate::store::ResultStore;

/// Result of asking the hub to start an operation.
#[derive(Debug)]
pub enum StartOutcome {
    /// A worker was spawned.
    Started {
        snapshot: SessionSnapshot,
        worker: JoinHandle<()>,
    },
    /// An operation of the same kind is running; nothing was spawned.
    AlreadyRunning(SessionSnapshot),
    /// The repository id is not in the stored report.
    UnknownRepository(RepoId),
}

impl StartOutcome {
    /// The session snapshot, if a session exists for this outcome.
    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        match self {
            Self::Started { snapshot, .. } | Self::AlreadyRunning(snapshot) => Some(snapshot),
            Self::UnknownRepository(_) => None,
        }
    }
}

/// Coordinates sessions, progress and storage for scans and pulls.
pub struct OperationHub {
    sessions: SessionManager,
    bus: ProgressBus,
    collaborator: Arc<dyn MetadataCollaborator>,
    store: Arc<dyn ResultStore>,
    config: ScanConfig,
}

impl OperationHub {
    pub fn new(
        config: ScanConfig,
        collaborator: Arc<dyn MetadataCollaborator>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(),
            bus: ProgressBus::new(),
            collaborator,
            store,
            config,
        }
    }

    /// Base configuration for scans.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The stored report, if any.
    pub fn report(&self) -> Option<ScanReport> {
        self.store.load()
    }

    pub fn snapshot(&self, kind: OperationKind) -> SessionSnapshot {
        self.sessions.snapshot(kind)
    }

    /// Subscribe to `kind` events, seeded with the current session state.
    pub fn subscribe(&self, kind: OperationKind) -> Subscription {
        self.bus.subscribe(kind).with_snapshot(self.snapshot(kind))
    }

    /// Start a scan in the background.
    ///
    /// `root` and `max_depth` default to the hub's configuration. Must be
    /// called from within a tokio runtime.
    pub fn start_scan(self: &Arc<Self>, root: Option<PathBuf>, max_depth: Option<u32>) -> StartOutcome {
        let root = root.unwrap_or_else(|| self.config.root.clone());
        let max_depth = max_depth.unwrap_or(self.config.max_depth);

        let guard = match self
            .sessions
            .try_acquire(OperationKind::Scan, Some(root.clone()), Some(max_depth))
        {
            Ok(guard) => guard,
            Err(SessionError::AlreadyActive(snapshot)) => {
                tracing::info!("scan already in progress");
                return StartOutcome::AlreadyRunning(snapshot);
            }
        };

        let snapshot = guard.snapshot();
        let hub = Arc::clone(self);
        let worker = tokio::task::spawn_blocking(move || hub.scan_worker(guard, root, max_depth));

        StartOutcome::Started { snapshot, worker }
    }

    /// Start pulling a stored repository in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_pull(self: &Arc<Self>, id: &RepoId) -> StartOutcome {
        let record = match self.find_repository(id) {
            Ok(record) => record,
            Err(_) => return StartOutcome::UnknownRepository(id.clone()),
        };

        let guard = match self
            .sessions
            .try_acquire(OperationKind::Pull, Some(record.path.clone()), None)
        {
            Ok(guard) => guard,
            Err(SessionError::AlreadyActive(snapshot)) => {
                tracing::info!("pull already in progress");
                return StartOutcome::AlreadyRunning(snapshot);
            }
        };

        let snapshot = guard.snapshot();
        let hub = Arc::clone(self);
        let worker = tokio::task::spawn_blocking(move || hub.pull_worker(guard, record));

        StartOutcome::Started { snapshot, worker }
    }

    /// The stored record for `id` merged with freshly read git metadata.
    pub fn repository_details(&self, id: &RepoId) -> Result<RepositoryRecord, HubError> {
        let record = self.find_repository(id)?;
        let metadata = self.collaborator.metadata_or_failed(&record.path);
        Ok(record.with_metadata(metadata))
    }

    /// Short-format working tree status of a stored repository.
    pub fn repository_status(&self, id: &RepoId) -> Result<String, HubError> {
        let record = self.find_repository(id)?;
        Ok(self.collaborator.status(&record.path)?)
    }

    fn find_repository(&self, id: &RepoId) -> Result<RepositoryRecord, HubError> {
        self.store
            .load()
            .and_then(|report| report.repository(id).cloned())
            .ok_or_else(|| HubError::UnknownRepository(id.clone()))
    }

    fn publish(&self, guard: &SessionGuard, kind: EventKind, message: String, detail: Option<EventDetail>) {
        let snapshot = guard.set_message(message.clone());
        let mut event = ProgressEvent::new(kind, message, snapshot);
        event.detail = detail;
        self.bus.publish(event);
    }

    /// Release the session, then publish the operation's last event.
    fn finish(&self, guard: SessionGuard, kind: EventKind, message: String, detail: Option<EventDetail>) {
        let snapshot = guard.finish(message.clone());
        let mut event = ProgressEvent::new(kind, message, snapshot);
        event.detail = detail;
        self.bus.publish(event);
    }

    fn scan_worker(&self, guard: SessionGuard, root: PathBuf, max_depth: u32) {
        let message = format!("Starting scan of {} (max depth: {max_depth})", root.display());
        tracing::info!("{message}");
        self.publish(&guard, EventKind::Started, message, None);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_scan(&guard, &root, max_depth)))
            .unwrap_or_else(|payload| Err(HubError::Panicked(panic_message(payload))));

        match result {
            Ok(report) => {
                let summary = report.summary();
                let message = format!(
                    "Scan completed. Found {} Git repositories.",
                    summary.repositories
                );
                tracing::info!(
                    directories = summary.directories,
                    warnings = summary.warnings,
                    "{message}"
                );
                self.finish(guard, EventKind::Completed, message, Some(EventDetail::Summary(summary)));
            }
            Err(err) => {
                tracing::error!(root = %root.display(), error = %err, "scan failed");
                self.finish(guard, EventKind::Error, format!("Error during scan: {err}"), None);
            }
        }
    }

    fn run_scan(&self, guard: &SessionGuard, root: &Path, max_depth: u32) -> Result<ScanReport, HubError> {
        let config = ScanConfig {
            root: root.to_path_buf(),
            max_depth,
            ..self.config.clone()
        };
        let scanner = RepoScanner::new(config.clone())?;

        let sink = |update: ScanUpdate| {
            let message = update.message();
            let snapshot = guard.record(message.clone(), update.is_repository());
            let kind = if update.is_failure() {
                EventKind::Error
            } else {
                EventKind::Progress
            };
            self.bus
                .publish(ProgressEvent::new(kind, message, snapshot).with_detail(EventDetail::from(&update)));
        };
        let outcome = scanner.scan(&sink)?;

        let found = outcome.repositories.len();
        self.publish(
            guard,
            EventKind::Progress,
            format!("Reading git details for {found} repositories"),
            None,
        );
        let report = build_report(outcome, &config, Some(self.collaborator.as_ref()));
        self.store.save(&report)?;
        Ok(report)
    }

    fn pull_worker(&self, guard: SessionGuard, record: RepositoryRecord) {
        let message = format!("Starting pull of {}", record.name);
        tracing::info!(path = %record.path.display(), "{message}");
        self.publish(&guard, EventKind::Started, message, None);

        let sink = |update: PullUpdate| {
            // The hub's own completion event is the only terminal one.
            let kind = match update.status {
                PullStatus::Error => EventKind::Error,
                PullStatus::Running | PullStatus::Success | PullStatus::Completed => EventKind::Progress,
            };
            let snapshot = guard.record(update.message.clone(), false);
            self.bus.publish(
                ProgressEvent::new(kind, update.message.clone(), snapshot)
                    .with_detail(EventDetail::Pull(update)),
            );
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.collaborator.pull(&record.path, &sink)))
            .unwrap_or_else(|payload| {
                PullOutcome::failed(format!("Error: {}", HubError::Panicked(panic_message(payload))))
            });

        if outcome.success {
            tracing::info!(path = %record.path.display(), "{}", outcome.message);
        } else {
            tracing::error!(path = %record.path.display(), "pull failed: {}", outcome.message);
        }
        self.finish(
            guard,
            EventKind::Completed,
            outcome.message.clone(),
            Some(EventDetail::PullResult(outcome)),
        );
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
