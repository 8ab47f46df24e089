//! Call domain: records, lifecycle state machine, and stores.
//!
//! The state machine ([`machine`]) is a pure transition function; the
//! lifecycle service ([`lifecycle`]) applies its results to the stores,
//! notifies terminal-state waiters, and tears down any live media session.

pub mod lifecycle;
pub mod machine;
pub mod store;
pub mod types;

pub use lifecycle::CallLifecycle;
pub use machine::{CallEvent, RecordingInfo, Transition, apply};
pub use store::{
    CallStore, CampaignProgress, CampaignStore, InMemoryCallStore, InMemoryCampaignStore,
    InMemoryInteractionStore, InMemoryLeadStore, InteractionStore, LeadStore,
};
pub use types::{
    Call, CallOutcome, CallStatus, Campaign, CampaignStatus, Interaction, Lead, Speaker,
};
