//! # Sync Transport
//!
//! The network seam of the engine: three request/response calls against
//! the sync server.
//!
//! ## Call Outcomes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HttpTransport::post_json                         │
//! │                                                                         │
//! │  send() fails ───────────────► Transport / Timeout                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  status not 2xx ─────────────► HttpStatus { status, code, message,     │
//! │       │                          details }  (from error envelope)      │
//! │       ▼                                                                 │
//! │  body doesn't decode ────────► MalformedResponse                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Ok(typed response)                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No retries happen here. A failed call goes back to the pipeline that
//! made it, which records it and waits for the next scheduled tick.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ServerSettings;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    ConflictActionRequest, ErrorEnvelope, PullRequest, PullResponse, PushRequest, PushResponse,
};

/// Request/response access to the sync server.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Submits a batch of events.
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Fetches one page of server-side changes.
    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Records a remediation action in the server's audit log.
    async fn conflict_action(&self, request: &ConflictActionRequest) -> SyncResult<()>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// JSON-over-HTTP transport on `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    push_url: String,
    pull_url: String,
    conflict_action_url: String,
}

impl HttpTransport {
    /// Builds a client with the configured request timeout.
    pub fn new(settings: &ServerSettings) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            push_url: settings.endpoint(&settings.push_path),
            pull_url: settings.endpoint(&settings.pull_path),
            conflict_action_url: settings.endpoint(&settings.conflict_action_path),
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    async fn post_json<Req, Res>(&self, url: &str, body: &Req) -> SyncResult<Res>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(url = %url, status = status.as_u16(), bytes = text.len(), "Sync response");

        if !status.is_success() {
            return Err(parse_error_response(status, &text));
        }

        decode_body(&text)
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.post_json(&self.push_url, request).await
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.post_json(&self.pull_url, request).await
    }

    async fn conflict_action(&self, request: &ConflictActionRequest) -> SyncResult<()> {
        let _: Value = self.post_json(&self.conflict_action_url, request).await?;
        Ok(())
    }
}

/// Decodes a 2xx body. An empty body decodes as JSON `null`.
fn decode_body<Res: DeserializeOwned>(text: &str) -> SyncResult<Res> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| SyncError::MalformedResponse(e.to_string()))
}

/// Maps a non-2xx response to [`SyncError::HttpStatus`], reading the error
/// envelope when the body is one.
fn parse_error_response(status: StatusCode, body: &str) -> SyncError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).unwrap_or_default();

    let message = envelope
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.chars().take(200).collect()
            }
        });

    SyncError::HttpStatus {
        status: status.as_u16(),
        code: envelope.code.filter(|c| !c.trim().is_empty()),
        message,
        details: envelope.errors,
    }
}
