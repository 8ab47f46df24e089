//! Outbound dial client.
//!
//! One REST call per attempt: ask the transport provider to place the call
//! leg, handing it the media-stream URL and the status-callback URL for
//! this call id. The response carries the provider's opaque call handle,
//! stored on the call record as `transport_session_id`.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors from placing the outbound call leg.
#[derive(Debug, Error)]
pub enum DialerError {
    #[error("Dial request failed: {0}")]
    RequestFailed(String),

    #[error("Transport rejected dial: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed dial response: {0}")]
    MalformedResponse(String),
}

pub type DialerResult<T> = Result<T, DialerError>;

/// Everything the transport needs to place one call leg.
#[derive(Debug, Clone)]
pub struct DialRequest {
    pub call_id: Uuid,
    /// E.164 destination number
    pub to: String,
    /// Caller id presented to the callee
    pub from: String,
    /// WebSocket URL the transport connects its media stream to
    pub stream_url: String,
    /// URL the transport posts status callbacks to
    pub status_callback_url: String,
}

/// Places outbound call legs. Wire-level only; retry policy lives with the
/// campaign layer, not here.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Place the call; returns the provider's opaque call handle.
    async fn dial(&self, request: &DialRequest) -> DialerResult<String>;
}

#[derive(Debug, Deserialize)]
struct DialResponse {
    sid: String,
}

/// REST dialer speaking the provider's call-creation endpoint.
pub struct HttpDialer {
    client: reqwest::Client,
    base_url: String,
    account: String,
    auth_token: String,
}

impl HttpDialer {
    pub fn new(base_url: String, account: String, auth_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            account,
            auth_token,
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/accounts/{}/calls",
            self.base_url.trim_end_matches('/'),
            self.account
        )
    }
}

#[async_trait]
impl Dialer for HttpDialer {
    async fn dial(&self, request: &DialRequest) -> DialerResult<String> {
        let params = [
            ("To", request.to.as_str()),
            ("From", request.from.as_str()),
            ("StreamUrl", request.stream_url.as_str()),
            ("StatusCallback", request.status_callback_url.as_str()),
        ];

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| DialerError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DialerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DialResponse = response
            .json()
            .await
            .map_err(|e| DialerError::MalformedResponse(e.to_string()))?;
        Ok(parsed.sid)
    }
}
