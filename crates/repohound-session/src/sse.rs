//! Server-Sent-Events framing of progress.
//!
//! Binding the stream to a socket is left to the embedding server; this
//! module only produces the frames.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::bus::HEARTBEAT_INTERVAL;
use crate::event::{EventDetail, EventKind, ProgressEvent};
use crate::hub::OperationHub;
use crate::session::{OperationKind, SessionSnapshot};

/// Discriminator of an SSE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SseStatus {
    /// Nothing of this kind is running.
    Idle,
    /// A scan was already running when the stream opened.
    Scanning,
    /// A pull was already running when the stream opened.
    Pulling,
    Started,
    Progress,
    Completed,
    Error,
    Heartbeat,
}

impl From<EventKind> for SseStatus {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Started => Self::Started,
            EventKind::Progress => Self::Progress,
            EventKind::Completed => Self::Completed,
            EventKind::Error => Self::Error,
            EventKind::Heartbeat => Self::Heartbeat,
        }
    }
}

/// JSON body of one SSE frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsePayload {
    pub status: SseStatus,
    pub progress: SessionSnapshot,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<EventDetail>,
}

impl SsePayload {
    /// The first frame of a stream, describing what is already running.
    pub fn initial(snapshot: SessionSnapshot) -> Self {
        let status = match (snapshot.active, snapshot.kind) {
            (false, _) => SseStatus::Idle,
            (true, OperationKind::Scan) => SseStatus::Scanning,
            (true, OperationKind::Pull) => SseStatus::Pulling,
        };
        Self {
            status,
            message: snapshot.message.clone(),
            progress: snapshot,
            update: None,
        }
    }
}

impl From<ProgressEvent> for SsePayload {
    fn from(event: ProgressEvent) -> Self {
        Self {
            status: event.kind.into(),
            progress: event.snapshot,
            message: event.message,
            update: event.detail,
        }
    }
}

/// Encode `payload` as a single `data: <json>\n\n` frame.
pub fn sse_frame(payload: &SsePayload) -> String {
    let json = serde_json::to_string(payload).unwrap_or_else(|err| {
        tracing::error!(error = %err, "could not encode progress payload");
        serde_json::json!({
            "status": SseStatus::Error,
            "message": format!("Could not encode progress: {err}"),
        })
        .to_string()
    });
    format!("data: {json}\n\n")
}

/// Payloads for one kind: the current state, then every event or a
/// heartbeat after each idle interval.
///
/// Subscribes immediately, so events published after this call are never
/// missed. Ends when the bus closes; dropping the stream only disconnects
/// this subscriber.
pub fn payload_stream(hub: Arc<OperationHub>, kind: OperationKind) -> impl Stream<Item = SsePayload> + Send + 'static {
    let subscription = hub.subscribe(kind);
    let head = stream::once(async move { SsePayload::initial(hub.snapshot(kind)) });
    let tail = stream::unfold(subscription, |mut subscription| async move {
        match subscription.poll(HEARTBEAT_INTERVAL).await {
            Ok(event) => Some((SsePayload::from(event), subscription)),
            Err(_) => None,
        }
    });
    head.chain(tail)
}

/// [`payload_stream`] encoded as SSE frames.
pub fn event_stream(hub: Arc<OperationHub>, kind: OperationKind) -> impl Stream<Item = String> + Send + 'static {
    payload_stream(hub, kind).map(|payload| sse_frame(&payload))
}
