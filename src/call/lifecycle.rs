//! Call lifecycle service.
//!
//! The one place state-machine transitions are applied to storage. Also
//! fans out the two side effects a terminal transition carries: waking
//! anything awaiting the call's end (campaign attempt tasks) and
//! synchronously tearing down the live media session so no further audio is
//! processed for that call id.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::relay::SessionRegistry;

use super::machine::{self, CallEvent};
use super::store::CallStore;
use super::types::Call;

pub struct CallLifecycle {
    calls: Arc<dyn CallStore>,
    registry: Arc<SessionRegistry>,
    terminal_watch: DashMap<Uuid, watch::Sender<bool>>,
}

impl CallLifecycle {
    pub fn new(calls: Arc<dyn CallStore>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            calls,
            registry,
            terminal_watch: DashMap::new(),
        }
    }

    /// Apply a lifecycle event to a call and persist the result.
    ///
    /// Ignored transitions (duplicates, out-of-order callbacks) are logged
    /// at debug and leave the record untouched. Returns the call after the
    /// event, or `None` if the call id is unknown.
    pub async fn apply(&self, call_id: Uuid, event: CallEvent) -> Option<Call> {
        let Some(call) = self.calls.get(call_id).await else {
            warn!(call_id = %call_id, ?event, "lifecycle event for unknown call");
            return None;
        };

        let transition = machine::apply(&call, &event, Utc::now());
        if !transition.changed {
            debug!(
                call_id = %call_id,
                status = ?call.status,
                ?event,
                "ignoring out-of-order or duplicate call event"
            );
            return Some(transition.call);
        }

        self.calls.update(transition.call.clone()).await;
        info!(
            call_id = %call_id,
            status = ?transition.call.status,
            outcome = ?transition.call.outcome,
            "call transition"
        );

        if transition.reached_terminal {
            if let Some((_, tx)) = self.terminal_watch.remove(&call_id) {
                let _ = tx.send(true);
            }
            // Synchronous teardown: after this, inbound events for the call
            // id find no registered session.
            self.registry.close(call_id);
        }

        Some(transition.call)
    }

    /// Subscribe to the call's terminal transition.
    ///
    /// The receiver reads `true` once the call has ended; calls that are
    /// already terminal yield an immediately-ready receiver.
    pub async fn subscribe_terminal(&self, call_id: Uuid) -> watch::Receiver<bool> {
        let rx = self
            .terminal_watch
            .entry(call_id)
            .or_insert_with(|| watch::channel(false).0)
            .subscribe();

        // Close the race with a transition that fired between the caller's
        // decision to wait and the channel insert.
        if let Some(call) = self.calls.get(call_id).await
            && call.status.is_terminal()
            && let Some((_, tx)) = self.terminal_watch.remove(&call_id)
        {
            let _ = tx.send(true);
        }

        rx
    }

    /// Wait until the call reaches a terminal state.
    pub async fn wait_terminal(&self, call_id: Uuid) {
        let mut rx = self.subscribe_terminal(call_id).await;
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}
