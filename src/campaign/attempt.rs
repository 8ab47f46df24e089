//! Per-lead call attempt execution.
//!
//! One attempt: resolve the lead, create the call record, place the dial,
//! then wait for the call to reach a terminal state. Every failure mode is
//! contained to the attempt — a bad lead or a rejected dial never stalls
//! the rest of the campaign queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::call::{Call, CallEvent, CallLifecycle, CallStore, LeadStore};
use crate::telephony::{DialRequest, Dialer};

/// How an attempt resolved, for campaign accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Call completed with a success-class outcome
    Success,
    /// Everything else: failed dial, missing lead, unsuccessful call
    Failure,
}

/// Executes one call attempt for one lead.
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn run(&self, campaign_id: Uuid, lead_id: Uuid) -> AttemptOutcome;
}

/// Production attempt runner: dial through the telephony transport and wait
/// for the state machine to finish the call.
pub struct CallAttemptRunner {
    leads: Arc<dyn LeadStore>,
    calls: Arc<dyn CallStore>,
    lifecycle: Arc<CallLifecycle>,
    dialer: Arc<dyn Dialer>,
    /// WebSocket URL the transport connects its media stream to
    stream_url: String,
    /// URL the transport posts status callbacks to
    status_callback_url: String,
    /// Caller id presented to callees
    caller_id: String,
    /// Upper bound on one call; a call with no terminal callback by then is
    /// failed so the campaign cannot hang
    max_call_duration: Duration,
}

impl CallAttemptRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        leads: Arc<dyn LeadStore>,
        calls: Arc<dyn CallStore>,
        lifecycle: Arc<CallLifecycle>,
        dialer: Arc<dyn Dialer>,
        stream_url: String,
        status_callback_url: String,
        caller_id: String,
        max_call_duration: Duration,
    ) -> Self {
        Self {
            leads,
            calls,
            lifecycle,
            dialer,
            stream_url,
            status_callback_url,
            caller_id,
            max_call_duration,
        }
    }
}

#[async_trait]
impl AttemptRunner for CallAttemptRunner {
    async fn run(&self, campaign_id: Uuid, lead_id: Uuid) -> AttemptOutcome {
        let Some(lead) = self.leads.get(lead_id).await else {
            warn!(campaign_id = %campaign_id, lead_id = %lead_id, "lead not found, skipping");
            return AttemptOutcome::Failure;
        };

        let call = Call::new(lead_id, Some(campaign_id));
        let call_id = call.id;
        self.calls.insert(call).await;

        // Subscribe before dialing so a terminal callback racing the dial
        // response is never missed.
        let terminal = self.lifecycle.subscribe_terminal(call_id).await;

        let request = DialRequest {
            call_id,
            to: lead.phone.clone(),
            from: self.caller_id.clone(),
            stream_url: self.stream_url.clone(),
            status_callback_url: self.status_callback_url.clone(),
        };

        match self.dialer.dial(&request).await {
            Ok(sid) => {
                if let Some(mut call) = self.calls.get(call_id).await {
                    call.transport_session_id = Some(sid);
                    self.calls.update(call).await;
                }
                info!(campaign_id = %campaign_id, call_id = %call_id, to = %lead.phone, "dialed");
            }
            Err(e) => {
                warn!(campaign_id = %campaign_id, call_id = %call_id, error = %e, "dial failed");
                self.lifecycle.apply(call_id, CallEvent::TransportFailed).await;
                return AttemptOutcome::Failure;
            }
        }

        let finished = tokio::time::timeout(self.max_call_duration, async {
            let mut rx = terminal;
            if *rx.borrow() {
                return;
            }
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    return;
                }
            }
        })
        .await;

        if finished.is_err() {
            warn!(campaign_id = %campaign_id, call_id = %call_id, "call exceeded max duration");
            self.lifecycle.apply(call_id, CallEvent::TransportFailed).await;
        }

        match self.calls.get(call_id).await {
            Some(call) if call.counts_as_successful() => AttemptOutcome::Success,
            _ => AttemptOutcome::Failure,
        }
    }
}
