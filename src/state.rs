//! Shared application state.
//!
//! One `Arc<AppState>` is threaded through every handler: configuration,
//! the store seams, the active-session registry, the call lifecycle
//! service, the campaign controller, and WebSocket connection tracking.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::call::{
    CallLifecycle, CallStore, CampaignStore, InMemoryCallStore, InMemoryCampaignStore,
    InMemoryInteractionStore, InMemoryLeadStore, InteractionStore, LeadStore,
};
use crate::campaign::{CallAttemptRunner, CampaignController};
use crate::config::ServerConfig;
use crate::relay::SessionRegistry;
use crate::synth::{BaseSynthesizer, CachedSynthesizer, SynthConfig, create_synthesizer};
use crate::telephony::{Dialer, HttpDialer};

/// Why a WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

pub struct AppState {
    pub config: ServerConfig,

    // Store seams (in-memory by default; persistence is an external
    // collaborator behind these traits)
    pub leads: Arc<dyn LeadStore>,
    pub calls: Arc<dyn CallStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub campaigns: Arc<dyn CampaignStore>,

    pub registry: Arc<SessionRegistry>,
    pub lifecycle: Arc<CallLifecycle>,
    pub dialer: Arc<dyn Dialer>,
    pub synthesizer: Arc<dyn BaseSynthesizer>,
    pub controller: Arc<CampaignController>,

    // WebSocket connection tracking
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let leads: Arc<dyn LeadStore> = Arc::new(InMemoryLeadStore::new());
        let calls: Arc<dyn CallStore> = Arc::new(InMemoryCallStore::new());
        let interactions: Arc<dyn InteractionStore> = Arc::new(InMemoryInteractionStore::new());
        let campaigns: Arc<dyn CampaignStore> = Arc::new(InMemoryCampaignStore::new());

        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Arc::new(CallLifecycle::new(calls.clone(), registry.clone()));

        let dialer: Arc<dyn Dialer> = Arc::new(HttpDialer::new(
            config.dialer_base_url.clone().unwrap_or_default(),
            config.dialer_account.clone().unwrap_or_default(),
            config.dialer_auth_token.clone().unwrap_or_default(),
        ));

        let synthesizer = build_synthesizer(&config);

        let runner = Arc::new(CallAttemptRunner::new(
            leads.clone(),
            calls.clone(),
            lifecycle.clone(),
            dialer.clone(),
            config.stream_url(),
            config.status_callback_url(),
            config.caller_id.clone().unwrap_or_default(),
            Duration::from_secs(config.max_call_duration_secs),
        ));
        let controller = Arc::new(CampaignController::new(campaigns.clone(), runner));

        Arc::new(Self {
            config,
            leads,
            calls,
            interactions,
            campaigns,
            registry,
            lifecycle,
            dialer,
            synthesizer,
            controller,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    // -------------------------------------------------------------------------
    // WebSocket connection limits
    // -------------------------------------------------------------------------

    /// Try to claim a connection slot for a client IP.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_stream_connections
            && self.ws_connections.load(Ordering::SeqCst) >= max
        {
            return Err(ConnectionLimitError::GlobalLimitReached);
        }

        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip {
            return Err(ConnectionLimitError::PerIpLimitReached);
        }

        *per_ip += 1;
        self.ws_connections.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Release a previously acquired connection slot.
    pub fn release_connection(&self, ip: IpAddr) {
        self.ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok();
        if let Some(mut per_ip) = self.ip_connections.get_mut(&ip) {
            *per_ip = per_ip.saturating_sub(1);
        }
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|n| *n).unwrap_or(0)
    }
}

fn build_synthesizer(config: &ServerConfig) -> Arc<dyn BaseSynthesizer> {
    let synth_config = SynthConfig {
        api_key: config.openai_api_key.clone().unwrap_or_default(),
        model: config.synth_model.clone(),
        voice: config.synth_voice.clone(),
        speed: config.synth_speed,
    };

    let inner = create_synthesizer(&config.synth_provider, synth_config)
        .unwrap_or_else(|e| {
            // A bad provider name is a configuration mistake; fall back to
            // the default provider so the server still starts and surfaces
            // the problem in logs rather than at first call time only.
            tracing::error!(error = %e, "invalid synthesis provider, falling back to openai");
            create_synthesizer(
                "openai",
                SynthConfig {
                    api_key: config.openai_api_key.clone().unwrap_or_default(),
                    model: "tts-1".to_string(),
                    voice: None,
                    speed: None,
                },
            )
            .expect("default synthesis provider is constructible")
        });

    Arc::new(CachedSynthesizer::new(inner, config.synth_cache_capacity))
}
