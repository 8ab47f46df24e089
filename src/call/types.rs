//! Call, interaction, campaign, and lead records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a call.
///
/// Ordering: `Scheduled < Ringing < InProgress < {Completed, Failed}`.
/// Transitions only ever move forward; see `machine::apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Created, dial not yet confirmed by the transport
    Scheduled,
    /// Transport reports the far end is ringing
    Ringing,
    /// Call answered, media session may be live
    InProgress,
    /// Terminal: call ran to completion
    Completed,
    /// Terminal: call never completed (busy, no answer, error)
    Failed,
}

impl CallStatus {
    /// Position in the forward-only lifecycle order.
    pub fn rank(&self) -> u8 {
        match self {
            CallStatus::Scheduled => 0,
            CallStatus::Ringing => 1,
            CallStatus::InProgress => 2,
            CallStatus::Completed | CallStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Failed)
    }
}

/// Business classification of a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Interested,
    NotInterested,
    CallbackRequested,
    Voicemail,
    NoAnswer,
    Busy,
    Failed,
}

impl CallOutcome {
    /// Whether this outcome counts toward a campaign's successful-call
    /// counter.
    pub fn is_success_class(&self) -> bool {
        matches!(self, CallOutcome::Interested | CallOutcome::CallbackRequested)
    }
}

/// One outbound call attempt.
///
/// Created by the campaign controller or the single-call API; mutated only
/// through the state machine; never deleted, only marked terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub status: CallStatus,
    pub outcome: Option<CallOutcome>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Derived at completion: `ended_at - started_at`, zero if never started
    pub duration_secs: Option<u32>,
    /// Opaque handle from the telephony transport, set after dial
    pub transport_session_id: Option<String>,
    pub recording_url: Option<String>,
    pub recording_duration_secs: Option<u32>,
}

impl Call {
    pub fn new(lead_id: Uuid, campaign_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            campaign_id,
            status: CallStatus::Scheduled,
            outcome: None,
            scheduled_at: Utc::now(),
            started_at: None,
            ended_at: None,
            duration_secs: None,
            transport_session_id: None,
            recording_url: None,
            recording_duration_secs: None,
        }
    }

    /// Success for campaign accounting: the call completed and its outcome,
    /// if classified, is a success class. An unclassified completed call
    /// counts as a successful connection.
    pub fn counts_as_successful(&self) -> bool {
        self.status == CallStatus::Completed
            && self.outcome.is_none_or(|o| o.is_success_class())
    }
}

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Ai,
    Customer,
}

/// Append-only transcript entry belonging to a call.
///
/// Never mutated after insert; `seq` is assigned by the store in append
/// order and interactions for one call are monotone in both `seq` and
/// `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub call_id: Uuid,
    pub seq: u64,
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sentiment: Option<f32>,
    pub confidence: Option<f32>,
}

/// Status of a batch dialing campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Running,
    Completed,
}

/// A batch of call attempts under shared concurrency and pacing limits.
///
/// Counters are owned exclusively by the campaign controller; invariants
/// `completed_calls <= total_leads` and monotone non-decreasing counters
/// are enforced by the store's atomic update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub status: CampaignStatus,
    pub total_leads: u32,
    pub completed_calls: u32,
    pub successful_calls: u32,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(total_leads: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: CampaignStatus::Running,
            total_leads,
            completed_calls: 0,
            successful_calls: 0,
            created_at: Utc::now(),
        }
    }
}

/// A callable lead. Lead management is an external collaborator; only the
/// attributes the engine uses for personalization live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub company: Option<String>,
    pub notes: Option<String>,
}
