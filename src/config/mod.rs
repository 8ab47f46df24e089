//! Server configuration.
//!
//! Sources, in priority order: YAML file > environment variables > `.env`
//! values (loaded by main before config resolution) > defaults. The YAML
//! path comes from the CLI; everything is validated once at startup.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

mod yaml;

pub use yaml::YamlConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// Server configuration.
///
/// Contains everything needed to run the dialcast server: listen address
/// and TLS, conversation engine and synthesis provider settings, telephony
/// transport credentials, and security limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build the stream and status
    /// callback URLs handed to the transport at dial time
    pub public_base_url: String,
    pub tls: Option<TlsConfig>,

    // Conversation engine
    pub engine_provider: String,
    pub openai_api_key: Option<String>,
    pub engine_model: String,
    pub engine_voice: Option<String>,
    /// `["text"]` for relay-side synthesis, `["text", "audio"]` for
    /// engine-side audio
    pub engine_modalities: Vec<String>,
    /// Instruction template; `{name}` and `{company}` are substituted per
    /// lead
    pub engine_instructions: String,
    pub engine_transcription_model: Option<String>,

    // Speech synthesis
    pub synth_provider: String,
    pub synth_model: String,
    pub synth_voice: Option<String>,
    pub synth_speed: Option<f32>,
    pub synth_cache_capacity: u64,

    // Telephony transport
    pub dialer_base_url: Option<String>,
    pub dialer_account: Option<String>,
    pub dialer_auth_token: Option<String>,
    pub caller_id: Option<String>,
    /// Shared secret for status-callback signatures; verification is off
    /// when unset
    pub status_auth_token: Option<String>,
    pub frame_duration_ms: u32,
    pub max_call_duration_secs: u64,

    // Security
    pub auth_required: bool,
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,
    pub max_stream_connections: Option<usize>,
    pub max_connections_per_ip: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            host: env_or("DIALCAST_HOST", "0.0.0.0"),
            port: env_parsed("DIALCAST_PORT", 8080)?,
            public_base_url: env_or("DIALCAST_PUBLIC_BASE_URL", "http://localhost:8080"),
            tls: tls_from_env(),

            engine_provider: env_or("ENGINE_PROVIDER", "openai"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            engine_model: env_or("ENGINE_MODEL", "gpt-4o-realtime-preview"),
            engine_voice: env_opt("ENGINE_VOICE"),
            engine_modalities: env_opt("ENGINE_MODALITIES")
                .map(|m| m.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["text".to_string()]),
            engine_instructions: env_or("ENGINE_INSTRUCTIONS", DEFAULT_INSTRUCTIONS),
            engine_transcription_model: env_opt("ENGINE_TRANSCRIPTION_MODEL"),

            synth_provider: env_or("SYNTH_PROVIDER", "openai"),
            synth_model: env_or("SYNTH_MODEL", "tts-1"),
            synth_voice: env_opt("SYNTH_VOICE"),
            synth_speed: env_opt("SYNTH_SPEED").and_then(|s| s.parse().ok()),
            synth_cache_capacity: env_parsed("SYNTH_CACHE_CAPACITY", 1024)?,

            dialer_base_url: env_opt("DIALER_BASE_URL"),
            dialer_account: env_opt("DIALER_ACCOUNT"),
            dialer_auth_token: env_opt("DIALER_AUTH_TOKEN"),
            caller_id: env_opt("DIALER_CALLER_ID"),
            status_auth_token: env_opt("STATUS_AUTH_TOKEN"),
            frame_duration_ms: env_parsed("FRAME_DURATION_MS", 20)?,
            max_call_duration_secs: env_parsed("MAX_CALL_DURATION_SECS", 600)?,

            auth_required: env_parsed("AUTH_REQUIRED", false)?,
            auth_api_secrets: env_opt("AUTH_API_SECRETS")
                .map(|raw| parse_api_secrets(raw.split(',')))
                .unwrap_or_default(),
            cors_allowed_origins: env_opt("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: env_parsed("RATE_LIMIT_RPS", 60)?,
            rate_limit_burst_size: env_parsed("RATE_LIMIT_BURST", 10)?,
            max_stream_connections: env_opt("MAX_STREAM_CONNECTIONS")
                .and_then(|s| s.parse().ok()),
            max_connections_per_ip: env_parsed("MAX_CONNECTIONS_PER_IP", 10)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables as
    /// the fallback layer.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let yaml = YamlConfig::parse(&contents)?;

        let mut config = Self::from_env()?;
        config.merge_yaml(yaml);
        config.validate()?;
        Ok(config)
    }

    fn merge_yaml(&mut self, yaml: YamlConfig) {
        let YamlConfig {
            server,
            engine,
            synthesis,
            telephony,
            security,
        } = yaml;

        merge(&mut self.host, server.host);
        merge(&mut self.port, server.port);
        merge(&mut self.public_base_url, server.public_base_url);
        if let (Some(cert_path), Some(key_path)) = (server.tls_cert_path, server.tls_key_path) {
            self.tls = Some(TlsConfig {
                cert_path,
                key_path,
            });
        }

        merge(&mut self.engine_provider, engine.provider);
        merge(&mut self.engine_model, engine.model);
        merge_opt(&mut self.engine_voice, engine.voice);
        merge(&mut self.engine_modalities, engine.modalities);
        merge(&mut self.engine_instructions, engine.instructions);
        merge_opt(
            &mut self.engine_transcription_model,
            engine.transcription_model,
        );

        merge(&mut self.synth_provider, synthesis.provider);
        merge(&mut self.synth_model, synthesis.model);
        merge_opt(&mut self.synth_voice, synthesis.voice);
        merge_opt(&mut self.synth_speed, synthesis.speed);
        merge(&mut self.synth_cache_capacity, synthesis.cache_capacity);

        merge_opt(&mut self.dialer_base_url, telephony.dialer_base_url);
        merge_opt(&mut self.dialer_account, telephony.dialer_account);
        merge_opt(&mut self.dialer_auth_token, telephony.dialer_auth_token);
        merge_opt(&mut self.caller_id, telephony.caller_id);
        merge_opt(&mut self.status_auth_token, telephony.status_auth_token);
        merge(&mut self.frame_duration_ms, telephony.frame_duration_ms);
        merge(
            &mut self.max_call_duration_secs,
            telephony.max_call_duration_secs,
        );

        merge(&mut self.auth_required, security.auth_required);
        if let Some(secrets) = security.api_secrets {
            self.auth_api_secrets = parse_api_secrets(secrets.iter().map(|s| s.as_str()));
        }
        merge_opt(&mut self.cors_allowed_origins, security.cors_allowed_origins);
        merge(
            &mut self.rate_limit_requests_per_second,
            security.rate_limit_requests_per_second,
        );
        merge(&mut self.rate_limit_burst_size, security.rate_limit_burst_size);
        merge_opt(&mut self.max_stream_connections, security.max_stream_connections);
        merge(
            &mut self.max_connections_per_ip,
            security.max_connections_per_ip,
        );
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_duration_ms must be positive".to_string(),
            ));
        }
        if self.auth_required && self.auth_api_secrets.is_empty() {
            return Err(ConfigError::Invalid(
                "auth_required is set but no API secrets are configured".to_string(),
            ));
        }
        if self.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY not configured; live calls will fail at engine connect");
        }
        if self.dialer_base_url.is_none() || self.dialer_account.is_none() {
            warn!("dialer not configured; outbound dialing is disabled");
        }
        Ok(())
    }

    /// The socket address string to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// WebSocket URL the transport connects its media streams to.
    pub fn stream_url(&self) -> String {
        let ws_base = self
            .public_base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{}/v1/streams", ws_base.trim_end_matches('/'))
    }

    /// URL the transport posts status callbacks to.
    pub fn status_callback_url(&self) -> String {
        format!(
            "{}/v1/calls/status",
            self.public_base_url.trim_end_matches('/')
        )
    }

    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// Whether the engine is expected to stream its own audio (relay skips
    /// sentence synthesis in that mode).
    pub fn engine_wants_audio(&self) -> bool {
        self.engine_modalities.iter().any(|m| m == "audio")
    }
}

/// Default instruction template; `{name}` and `{company}` are substituted
/// per lead at session start.
const DEFAULT_INSTRUCTIONS: &str = "You are a friendly, concise sales agent on an outbound \
phone call with {name} from {company}. Introduce yourself, explain why you are calling in one \
sentence, and have a natural conversation. Keep replies under three sentences.";

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env_opt(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{key} has an unparseable value: {raw}"))),
        None => Ok(default),
    }
}

fn tls_from_env() -> Option<TlsConfig> {
    let cert = env_opt("DIALCAST_TLS_CERT_PATH")?;
    let key = env_opt("DIALCAST_TLS_KEY_PATH")?;
    Some(TlsConfig {
        cert_path: PathBuf::from(cert),
        key_path: PathBuf::from(key),
    })
}

/// Parse `id:secret` entries, skipping malformed ones with a warning.
fn parse_api_secrets<'a>(entries: impl Iterator<Item = &'a str>) -> Vec<AuthApiSecret> {
    entries
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once(':') {
                Some((id, secret)) if !id.is_empty() && !secret.is_empty() => {
                    Some(AuthApiSecret {
                        id: id.to_string(),
                        secret: secret.to_string(),
                    })
                }
                _ => {
                    warn!("skipping malformed API secret entry (expected id:secret)");
                    None
                }
            }
        })
        .collect()
}

fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn merge_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn base_config() -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 8080,
            public_base_url: "https://dialcast.example".to_string(),
            tls: None,
            engine_provider: "openai".to_string(),
            openai_api_key: Some("sk-test".to_string()),
            engine_model: "gpt-4o-realtime-preview".to_string(),
            engine_voice: None,
            engine_modalities: vec!["text".to_string()],
            engine_instructions: DEFAULT_INSTRUCTIONS.to_string(),
            engine_transcription_model: None,
            synth_provider: "openai".to_string(),
            synth_model: "tts-1".to_string(),
            synth_voice: None,
            synth_speed: None,
            synth_cache_capacity: 1024,
            dialer_base_url: Some("https://transport.example".to_string()),
            dialer_account: Some("AC1".to_string()),
            dialer_auth_token: Some("token".to_string()),
            caller_id: Some("+15550000000".to_string()),
            status_auth_token: None,
            frame_duration_ms: 20,
            max_call_duration_secs: 600,
            auth_required: false,
            auth_api_secrets: Vec::new(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_stream_connections: None,
            max_connections_per_ip: 10,
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.frame_duration_ms, 20);
        assert_eq!(config.engine_modalities, vec!["text".to_string()]);
        assert!(!config.auth_required);
    }

    #[test]
    fn test_stream_url_scheme_mapping() {
        let mut config = base_config();
        assert_eq!(config.stream_url(), "wss://dialcast.example/v1/streams");

        config.public_base_url = "http://localhost:8080".to_string();
        assert_eq!(config.stream_url(), "ws://localhost:8080/v1/streams");
    }

    #[test]
    fn test_status_callback_url() {
        let config = base_config();
        assert_eq!(
            config.status_callback_url(),
            "https://dialcast.example/v1/calls/status"
        );
    }

    #[test]
    fn test_validate_rejects_zero_frame_duration() {
        let mut config = base_config();
        config.frame_duration_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_auth_without_secrets() {
        let mut config = base_config();
        config.auth_required = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_yaml_overrides_env_layer() {
        let mut config = base_config();
        let yaml = YamlConfig::parse(
            r#"
server:
  port: 9443
engine:
  modalities: ["text", "audio"]
security:
  api_secrets: ["tenant-a:s3cret"]
"#,
        )
        .unwrap();

        config.merge_yaml(yaml);
        assert_eq!(config.port, 9443);
        assert!(config.engine_wants_audio());
        assert_eq!(config.auth_api_secrets.len(), 1);
        assert_eq!(config.auth_api_secrets[0].id, "tenant-a");
        // Untouched fields keep their previous layer's values.
        assert_eq!(config.host, "localhost");
    }

    #[test]
    #[serial]
    fn test_from_file_layers_over_env() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9090
telephony:
  frame_duration_ms: 40
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.frame_duration_ms, 40);
        // Fields the file does not set keep their env-layer defaults.
        assert_eq!(config.synth_model, "tts-1");
    }

    #[test]
    fn test_from_file_missing_path_errors() {
        let err = ServerConfig::from_file(Path::new("/nonexistent/dialcast.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_api_secrets_skips_malformed() {
        let parsed = parse_api_secrets(["a:1", "broken", ":x", "b:2", ""].into_iter());
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "a");
        assert_eq!(parsed[1].secret, "2");
    }
}
