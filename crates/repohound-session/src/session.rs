//! Per-kind operation sessions.
//!
//! Each [`OperationKind`] has exactly one slot. Starting an operation flips
//! the slot's active flag with a compare-and-set; the returned
//! [`SessionGuard`] clears it again when dropped, on every exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::SessionError;

/// Kind of long-running operation. At most one of each runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    Scan,
    Pull,
}

/// Point-in-time copy of a session's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub kind: OperationKind,
    pub active: bool,
    /// Scan root or repository being pulled.
    pub root_path: Option<PathBuf>,
    pub max_depth: Option<u32>,
    /// Progress updates handled so far.
    pub processed_count: u64,
    /// Repositories found so far.
    pub found_count: u64,
    /// Latest progress message.
    pub message: String,
}

impl SessionSnapshot {
    /// State of a kind with nothing running yet.
    pub fn idle(kind: OperationKind) -> Self {
        Self {
            kind,
            active: false,
            root_path: None,
            max_depth: None,
            processed_count: 0,
            found_count: 0,
            message: String::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    active: AtomicBool,
    state: Mutex<SessionSnapshot>,
}

impl Slot {
    fn new(kind: OperationKind) -> Self {
        Self {
            active: AtomicBool::new(false),
            state: Mutex::new(SessionSnapshot::idle(kind)),
        }
    }
}

/// Owns the session slot for every operation kind.
#[derive(Debug)]
pub struct SessionManager {
    scan: Arc<Slot>,
    pull: Arc<Slot>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            scan: Arc::new(Slot::new(OperationKind::Scan)),
            pull: Arc::new(Slot::new(OperationKind::Pull)),
        }
    }

    fn slot(&self, kind: OperationKind) -> &Arc<Slot> {
        match kind {
            OperationKind::Scan => &self.scan,
            OperationKind::Pull => &self.pull,
        }
    }

    /// Start a session of `kind`, resetting its counters.
    ///
    /// Fails with the live snapshot if a session of that kind is already active.
    pub fn try_acquire(
        &self,
        kind: OperationKind,
        root_path: Option<PathBuf>,
        max_depth: Option<u32>,
    ) -> Result<SessionGuard, SessionError> {
        let slot = self.slot(kind);
        let mut state = slot.state.lock();

        if slot
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::AlreadyActive(state.clone()));
        }

        *state = SessionSnapshot {
            active: true,
            root_path,
            max_depth,
            ..SessionSnapshot::idle(kind)
        };
        drop(state);

        Ok(SessionGuard {
            slot: Arc::clone(slot),
            released: false,
        })
    }

    /// Whether a session of `kind` is running.
    pub fn is_active(&self, kind: OperationKind) -> bool {
        self.slot(kind).active.load(Ordering::Acquire)
    }

    /// Current state of the `kind` session.
    pub fn snapshot(&self, kind: OperationKind) -> SessionSnapshot {
        self.slot(kind).state.lock().clone()
    }
}

/// Exclusive handle on an active session.
///
/// Only the owning worker mutates the session. Dropping the guard marks the
/// session inactive, including during unwinding.
#[derive(Debug)]
pub struct SessionGuard {
    slot: Arc<Slot>,
    released: bool,
}

impl SessionGuard {
    pub fn kind(&self) -> OperationKind {
        self.slot.state.lock().kind
    }

    /// Count one progress update and return the updated snapshot.
    pub fn record(&self, message: impl Into<String>, found: bool) -> SessionSnapshot {
        let mut state = self.slot.state.lock();
        state.processed_count += 1;
        if found {
            state.found_count += 1;
        }
        state.message = message.into();
        state.clone()
    }

    /// Replace the latest message without counting an update.
    pub fn set_message(&self, message: impl Into<String>) -> SessionSnapshot {
        let mut state = self.slot.state.lock();
        state.message = message.into();
        state.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.slot.state.lock().clone()
    }

    /// Set the final message and release the session.
    ///
    /// The returned snapshot is inactive, and a new session of the same kind
    /// can be acquired as soon as this returns.
    pub fn finish(mut self, message: impl Into<String>) -> SessionSnapshot {
        let mut state = self.slot.state.lock();
        state.message = message.into();
        let snapshot = self.release(&mut state);
        drop(state);
        self.released = true;
        snapshot
    }

    fn release(&self, state: &mut SessionSnapshot) -> SessionSnapshot {
        state.active = false;
        self.slot.active.store(false, Ordering::Release);
        state.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = self.slot.state.lock();
        self.release(&mut state);
    }
}
