//! Progress events distributed to subscribers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::Display;

use repohound_core::{PullOutcome, PullUpdate, ScanSummary};
use repohound_scan::ScanUpdate;

use crate::session::SessionSnapshot;

/// What a progress event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Started,
    Progress,
    Completed,
    Error,
    /// Synthesized by a subscriber when nothing arrived in time.
    Heartbeat,
}

/// Structured payload attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDetail {
    /// A directory entered, repository found or subtree failure during a scan.
    Scan { path: PathBuf, depth: Option<u32> },
    /// Counts from a finished scan.
    Summary(ScanSummary),
    /// A progress report relayed from a pull.
    Pull(PullUpdate),
    /// Result of a finished pull.
    PullResult(PullOutcome),
}

impl From<&ScanUpdate> for EventDetail {
    fn from(update: &ScanUpdate) -> Self {
        let depth = match update {
            ScanUpdate::Entering { depth, .. } | ScanUpdate::RepositoryFound { depth, .. } => Some(*depth),
            ScanUpdate::Failed { .. } => None,
        };
        Self::Scan {
            path: update.path().to_path_buf(),
            depth,
        }
    }
}

/// One immutable progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<EventDetail>,
    /// Session counters as of this event.
    pub snapshot: SessionSnapshot,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, message: impl Into<String>, snapshot: SessionSnapshot) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            snapshot,
        }
    }

    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Liveness event repeating the last known snapshot.
    pub fn heartbeat(snapshot: SessionSnapshot) -> Self {
        let message = snapshot.message.clone();
        Self::new(EventKind::Heartbeat, message, snapshot)
    }

    /// Whether this is the last event of an operation.
    ///
    /// Error events with a detail report a recovered failure inside a still
    /// running operation; only a bare error ends it.
    pub fn is_terminal(&self) -> bool {
        match self.kind {
            EventKind::Completed => true,
            EventKind::Error => self.detail.is_none(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OperationKind;
    use repohound_core::PullStatus;

    #[test]
    fn test_terminal_events() {
        let snapshot = SessionSnapshot::idle(OperationKind::Scan);
        let failed_child = ProgressEvent::new(EventKind::Error, "Error scanning /r/x: boom", snapshot.clone())
            .with_detail(EventDetail::Scan {
                path: PathBuf::from("/r/x"),
                depth: None,
            });

        assert!(!failed_child.is_terminal());
        assert!(ProgressEvent::new(EventKind::Error, "Error during scan: gone", snapshot.clone()).is_terminal());
        assert!(ProgressEvent::new(EventKind::Completed, "done", snapshot.clone()).is_terminal());
        assert!(!ProgressEvent::heartbeat(snapshot).is_terminal());
    }

    #[test]
    fn test_detail_from_scan_update() {
        let update = ScanUpdate::RepositoryFound {
            path: PathBuf::from("/r/a"),
            depth: 1,
        };
        assert_eq!(
            EventDetail::from(&update),
            EventDetail::Scan {
                path: PathBuf::from("/r/a"),
                depth: Some(1)
            }
        );
    }

    #[test]
    fn test_event_json() {
        let mut snapshot = SessionSnapshot::idle(OperationKind::Pull);
        snapshot.message = "Receiving objects: 50% (1/2)".to_string();
        let event = ProgressEvent::new(EventKind::Progress, snapshot.message.clone(), snapshot)
            .with_detail(EventDetail::Pull(PullUpdate::transfer("Receiving objects", 1, 2)));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["detail"]["type"], "pull");
        assert_eq!(json["detail"]["operation"], "Receiving objects");
        assert_eq!(json["detail"]["status"], serde_json::json!(PullStatus::Running));
        assert_eq!(json["snapshot"]["kind"], "pull");

        let back: ProgressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
