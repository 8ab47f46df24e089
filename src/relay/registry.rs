//! Active-session registry.
//!
//! One owned, synchronized map from call id to live session handle, with
//! explicit insert-on-start and remove-on-stop so session lifetime is
//! unambiguous. Registration and deregistration cannot race with an inbound
//! event lookup: all access goes through the concurrent map.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::telephony::StreamCommand;

/// Handle to a live relay session.
#[derive(Clone)]
pub struct SessionHandle {
    pub call_id: Uuid,
    /// Transport session identifier echoed on every outbound frame
    pub stream_sid: String,
    /// Cancelling this token ends the session's pump loop
    pub cancel: CancellationToken,
    /// Outbound command channel to the transport connection
    pub outbound: mpsc::Sender<StreamCommand>,
}

/// Registry of live sessions, keyed by call id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session at transport start. Returns the handle that was
    /// displaced, if a session for this call id was somehow still live.
    pub fn insert(&self, handle: SessionHandle) -> Option<SessionHandle> {
        let displaced = self.sessions.insert(handle.call_id, handle);
        if let Some(ref old) = displaced {
            tracing::warn!(call_id = %old.call_id, "displacing stale session registration");
            old.cancel.cancel();
        }
        displaced
    }

    pub fn get(&self, call_id: Uuid) -> Option<SessionHandle> {
        self.sessions.get(&call_id).map(|h| h.clone())
    }

    /// Deregister at session end.
    pub fn remove(&self, call_id: Uuid) -> Option<SessionHandle> {
        self.sessions.remove(&call_id).map(|(_, h)| h)
    }

    /// Cancel the session for a call, if one is live. Synchronous: after
    /// this returns the token is cancelled and no further audio will be
    /// accepted for the call id once the pump observes it.
    pub fn close(&self, call_id: Uuid) {
        if let Some(handle) = self.sessions.get(&call_id) {
            handle.cancel.cancel();
        }
    }

    pub fn contains(&self, call_id: Uuid) -> bool {
        self.sessions.contains_key(&call_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
