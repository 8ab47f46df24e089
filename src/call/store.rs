//! Store seams for call, interaction, campaign, and lead records.
//!
//! Persistence is an external collaborator; the core only needs these
//! traits. The in-memory implementations back the server by default and the
//! whole test suite.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::types::{Call, Campaign, CampaignStatus, Interaction, Lead, Speaker};

/// Call record storage. Mutations flow exclusively through the lifecycle
/// service, which applies state-machine transitions.
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn insert(&self, call: Call);
    async fn get(&self, id: Uuid) -> Option<Call>;
    async fn update(&self, call: Call);
    async fn list(&self) -> Vec<Call>;
}

/// Append-only interaction log. `append` assigns the per-call sequence
/// number; entries are never mutated afterwards.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn append(
        &self,
        call_id: Uuid,
        speaker: Speaker,
        content: String,
        sentiment: Option<f32>,
        confidence: Option<f32>,
    ) -> Interaction;

    async fn list(&self, call_id: Uuid) -> Vec<Interaction>;
}

/// Snapshot returned by a campaign progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignProgress {
    pub completed_calls: u32,
    pub successful_calls: u32,
    pub total_leads: u32,
    /// True exactly once: on the update that made `completed == total`
    pub just_completed: bool,
}

/// Campaign storage. `record_attempt` is the single atomic counter update
/// the controller uses; a lost update here would break completion
/// detection, so the whole read-modify-write happens under the entry lock.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert(&self, campaign: Campaign);
    async fn get(&self, id: Uuid) -> Option<Campaign>;
    async fn record_attempt(&self, id: Uuid, successful: bool) -> Option<CampaignProgress>;
}

/// Lead lookup seam. CRUD beyond this is out of scope.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert(&self, lead: Lead);
    async fn get(&self, id: Uuid) -> Option<Lead>;
    async fn list(&self) -> Vec<Lead>;
}

// =============================================================================
// In-memory implementations
// =============================================================================

#[derive(Default)]
pub struct InMemoryCallStore {
    calls: DashMap<Uuid, Call>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn insert(&self, call: Call) {
        self.calls.insert(call.id, call);
    }

    async fn get(&self, id: Uuid) -> Option<Call> {
        self.calls.get(&id).map(|c| c.clone())
    }

    async fn update(&self, call: Call) {
        self.calls.insert(call.id, call);
    }

    async fn list(&self) -> Vec<Call> {
        self.calls.iter().map(|c| c.clone()).collect()
    }
}

#[derive(Default)]
pub struct InMemoryInteractionStore {
    // Mutex over Vec keeps append order authoritative per call.
    interactions: DashMap<Uuid, Mutex<Vec<Interaction>>>,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InteractionStore for InMemoryInteractionStore {
    async fn append(
        &self,
        call_id: Uuid,
        speaker: Speaker,
        content: String,
        sentiment: Option<f32>,
        confidence: Option<f32>,
    ) -> Interaction {
        let entry = self.interactions.entry(call_id).or_default();
        let mut log = entry.lock();
        let interaction = Interaction {
            call_id,
            seq: log.len() as u64,
            speaker,
            content,
            timestamp: Utc::now(),
            sentiment,
            confidence,
        };
        log.push(interaction.clone());
        interaction
    }

    async fn list(&self, call_id: Uuid) -> Vec<Interaction> {
        self.interactions
            .get(&call_id)
            .map(|entry| entry.lock().clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct InMemoryCampaignStore {
    campaigns: DashMap<Uuid, Campaign>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn insert(&self, campaign: Campaign) {
        self.campaigns.insert(campaign.id, campaign);
    }

    async fn get(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|c| c.clone())
    }

    async fn record_attempt(&self, id: Uuid, successful: bool) -> Option<CampaignProgress> {
        // The DashMap entry guard is the per-campaign lock: counter reads
        // and writes cannot interleave across concurrent completions.
        let mut entry = self.campaigns.get_mut(&id)?;

        if entry.completed_calls >= entry.total_leads {
            // Counter already saturated; a surplus attempt report must not
            // break the `completed <= total` invariant.
            tracing::warn!(campaign_id = %id, "attempt reported after campaign already complete");
            return Some(CampaignProgress {
                completed_calls: entry.completed_calls,
                successful_calls: entry.successful_calls,
                total_leads: entry.total_leads,
                just_completed: false,
            });
        }

        entry.completed_calls += 1;
        if successful {
            entry.successful_calls += 1;
        }

        let just_completed = entry.completed_calls == entry.total_leads
            && entry.status == CampaignStatus::Running;
        if just_completed {
            entry.status = CampaignStatus::Completed;
        }

        Some(CampaignProgress {
            completed_calls: entry.completed_calls,
            successful_calls: entry.successful_calls,
            total_leads: entry.total_leads,
            just_completed,
        })
    }
}

#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: DashMap<Uuid, Lead>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn insert(&self, lead: Lead) {
        self.leads.insert(lead.id, lead);
    }

    async fn get(&self, id: Uuid) -> Option<Lead> {
        self.leads.get(&id).map(|l| l.clone())
    }

    async fn list(&self) -> Vec<Lead> {
        self.leads.iter().map(|l| l.clone()).collect()
    }
}
