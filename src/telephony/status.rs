//! Status callback contract.
//!
//! The transport reports coarse call progress through asynchronous one-shot
//! notifications keyed by call id. Callbacks may arrive duplicated or out
//! of order; the state machine owns that discipline — this module only maps
//! the wire shape onto lifecycle events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::call::{CallEvent, RecordingInfo};

/// Coarse call status as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportCallStatus {
    Queued,
    Initiated,
    Ringing,
    Answered,
    Completed,
    Busy,
    NoAnswer,
    Failed,
}

/// One status notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCallback {
    pub call_id: Uuid,
    pub status: TransportCallStatus,
    /// Answering-machine detection flag, when the transport supports it
    #[serde(default)]
    pub answering_machine: Option<bool>,
    /// Transport-measured duration, present on completion
    #[serde(default)]
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub recording_duration_secs: Option<u32>,
}

impl StatusCallback {
    /// Map the coarse status onto a lifecycle event.
    ///
    /// `Queued`/`Initiated` carry no lifecycle information beyond what the
    /// dial already established and map to `None`.
    pub fn to_call_event(&self) -> Option<CallEvent> {
        match self.status {
            TransportCallStatus::Queued | TransportCallStatus::Initiated => None,
            TransportCallStatus::Ringing => Some(CallEvent::Ringing),
            TransportCallStatus::Answered => Some(CallEvent::Answered),
            TransportCallStatus::Completed => Some(CallEvent::Completed {
                duration_secs: self.duration_secs,
                recording: RecordingInfo {
                    url: self.recording_url.clone(),
                    duration_secs: self.recording_duration_secs,
                },
            }),
            TransportCallStatus::Busy => Some(CallEvent::Busy),
            TransportCallStatus::NoAnswer => Some(CallEvent::NoAnswer),
            TransportCallStatus::Failed => Some(CallEvent::TransportFailed),
        }
    }
}
