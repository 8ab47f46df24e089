//! YAML configuration file loading.
//!
//! Every field is optional; anything absent falls back to the value already
//! resolved from environment variables or defaults. Unknown keys are
//! rejected so typos fail loudly at startup.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub synthesis: SynthesisSection,
    #[serde(default)]
    pub telephony: TelephonySection,
    #[serde(default)]
    pub security: SecuritySection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_base_url: Option<String>,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub modalities: Option<Vec<String>>,
    pub instructions: Option<String>,
    pub transcription_model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthesisSection {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub cache_capacity: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelephonySection {
    pub dialer_base_url: Option<String>,
    pub dialer_account: Option<String>,
    pub dialer_auth_token: Option<String>,
    pub caller_id: Option<String>,
    pub status_auth_token: Option<String>,
    pub frame_duration_ms: Option<u32>,
    pub max_call_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecuritySection {
    pub auth_required: Option<bool>,
    /// `id:secret` entries accepted by the API auth middleware
    pub api_secrets: Option<Vec<String>>,
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_stream_connections: Option<usize>,
    pub max_connections_per_ip: Option<usize>,
}

impl YamlConfig {
    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}
