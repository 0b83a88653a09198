//! Operation sessions, progress distribution and result storage.
//!
//! - [`SessionManager`] admits at most one scan and one pull at a time.
//! - [`ProgressBus`] fans every event out to every subscriber.
//! - [`OperationHub`] runs scans and pulls on blocking workers and relays
//!   their progress.
//! - [`event_stream`] renders a kind's progress as Server-Sent-Events frames.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use repohound_core::{MetadataCollaborator, ScanConfig};
//! use repohound_session::{JsonResultStore, OperationHub, OperationKind, event_stream};
//!
//! # async fn run(collaborator: Arc<dyn MetadataCollaborator>) {
//! let store = Arc::new(JsonResultStore::new("/tmp/scan.json"));
//! let hub = Arc::new(OperationHub::new(ScanConfig::new("/srv/code"), collaborator, store));
//!
//! let mut frames = Box::pin(event_stream(Arc::clone(&hub), OperationKind::Scan));
//! hub.start_scan(None, None);
//! while let Some(frame) = frames.next().await {
//!     print!("{frame}");
//! }
//! # }
//! ```

mod bus;
mod error;
mod event;
mod hub;
mod session;
mod sse;
mod store;

pub use bus::{DEFAULT_CAPACITY, HEARTBEAT_INTERVAL, ProgressBus, Subscription};
pub use error::{BusError, HubError, SessionError, StoreError};
pub use event::{EventDetail, EventKind, ProgressEvent};
pub use hub::{OperationHub, StartOutcome};
pub use session::{OperationKind, SessionGuard, SessionManager, SessionSnapshot};
pub use sse::{SsePayload, SseStatus, event_stream, payload_stream, sse_frame};
pub use store::{JsonResultStore, MemoryResultStore, ResultStore};
