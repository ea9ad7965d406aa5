//! Client for the history service.
//!
//! The backend owns durable conversation history keyed by session id; the
//! client only pulls a transcript on demand and requests purges. Responses
//! are decoded into typed shapes at this boundary before anything enters
//! the pipeline.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::message::Role;
use crate::session::generate_trace_id;

/// One transcript entry as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearRequest<'a> {
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClearResponse {
    cleared: bool,
}

/// Client for the history endpoints of the answer service.
pub struct HistoryClient {
    base_url: String,
    http: reqwest::Client,
}

impl HistoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetches the ordered transcript for a session.
    pub async fn get(&self, session_id: &str) -> Result<Vec<HistoryMessage>> {
        let url = format!("{}/ai/chat/history/{}", self.base_url, session_id);

        let response = self
            .http
            .get(&url)
            .header("X-Trace-ID", generate_trace_id())
            .send()
            .await
            .context("Failed to reach history service")?;

        let status = response.status();
        if !status.is_success() {
            bail!("History fetch failed with HTTP {}", status.as_u16());
        }

        response
            .json::<Vec<HistoryMessage>>()
            .await
            .context("Failed to decode history response")
    }

    /// Asks the backend to purge the session's history. Returns the ack.
    pub async fn clear(&self, session_id: &str) -> Result<bool> {
        let url = format!("{}/ai/chat/clear-history", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("X-Trace-ID", generate_trace_id())
            .json(&ClearRequest { session_id })
            .send()
            .await
            .context("Failed to reach history service")?;

        let status = response.status();
        if !status.is_success() {
            bail!("History purge failed with HTTP {}", status.as_u16());
        }

        let ack: ClearResponse = response
            .json()
            .await
            .context("Failed to decode clear-history response")?;
        Ok(ack.cleared)
    }
}
