//! HTTPS JSON batch upstream ("Relay", spec.md §4.4.3): a small
//! `reqwest::Client` wrapping each query in a one-item batch request,
//! grounded on the teacher's `reqwest::Client::builder()` usage in
//! `blocking/updater.rs`. Batching of more than one item per request is
//! not attempted here since the resolver core only ever has one query to
//! send per `resolve` call; `relay_max_items` still bounds what a single
//! request is allowed to carry so the wire format stays forward-compatible
//! with a batching caller.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::warn;

use crate::config::RelayStartupCheck;
use crate::error::UpstreamError;

use super::UpstreamTransport;

#[derive(Serialize)]
struct DnsRequest<'a> {
    v: u32,
    id: &'a str,
    items: Vec<DnsItemRequest<'a>>,
}

#[derive(Serialize)]
struct DnsItemRequest<'a> {
    id: &'a str,
    q: String,
}

#[derive(Deserialize)]
struct DnsResponse {
    items: Vec<DnsItemResponse>,
}

#[derive(Deserialize)]
struct DnsItemResponse {
    id: String,
    ok: bool,
    #[serde(default)]
    a: Option<String>,
    #[serde(default)]
    err: Option<String>,
}

#[derive(Deserialize)]
struct InfoResponse {
    v: u32,
    limits: InfoLimits,
    #[serde(default)]
    auth_required: bool,
}

#[derive(Deserialize)]
struct InfoLimits {
    max_items: usize,
    max_request_bytes: usize,
    per_item_max_wire_bytes: usize,
    max_response_bytes: usize,
}

const BATCH_ITEM_ID: &str = "1";

pub struct RelayTransport {
    client: Client,
    dns_url: String,
    info_url: String,
    api_version: u32,
    auth_token: String,
    max_request_bytes: usize,
    per_item_max_wire_bytes: usize,
    max_response_bytes: usize,
}

impl RelayTransport {
    pub fn new(
        base_url: &str,
        api_version: u32,
        auth_token: String,
        max_request_bytes: usize,
        per_item_max_wire_bytes: usize,
        max_response_bytes: usize,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(concat!("resilientdns/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::RelayClientError(e.to_string()))?;
        let base = base_url.trim_end_matches('/');
        Ok(RelayTransport {
            client,
            dns_url: format!("{base}/v{api_version}/dns"),
            info_url: format!("{base}/v{api_version}/info"),
            api_version,
            auth_token,
            max_request_bytes,
            per_item_max_wire_bytes,
            max_response_bytes,
        })
    }

    /// Fetches `/v{n}/info` and checks the advertised version and limits
    /// against this transport's configuration. Called once at startup; the
    /// caller decides whether a failure is fatal (`RelayStartupCheck::Require`),
    /// logged-only (`Warn`), or skipped entirely (`Off`).
    pub async fn startup_check(&self, mode: RelayStartupCheck) -> Result<(), UpstreamError> {
        if mode == RelayStartupCheck::Off {
            return Ok(());
        }

        let result = self.fetch_info().await;
        match (&result, mode) {
            (Ok(_), _) => {}
            (Err(e), RelayStartupCheck::Warn) => {
                warn!(error = %e, "relay startup check failed, continuing per relay_startup_check=warn");
                return Ok(());
            }
            (Err(_), _) => {}
        }
        result
    }

    async fn fetch_info(&self) -> Result<(), UpstreamError> {
        let mut req = self.client.get(&self.info_url);
        if !self.auth_token.is_empty() {
            req = req.bearer_auth(&self.auth_token);
        }
        let resp = req
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|_| UpstreamError::RelayTimeout)?;
        if resp.status() == StatusCode::UNAUTHORIZED || resp.status() == StatusCode::FORBIDDEN {
            return Err(UpstreamError::RelayUnauthorized);
        }
        if !resp.status().is_success() {
            return Err(UpstreamError::RelayClientError(format!("info endpoint returned {}", resp.status())));
        }
        let info: InfoResponse = resp
            .json()
            .await
            .map_err(|e| UpstreamError::RelayProtocolError(e.to_string()))?;

        if info.v != self.api_version {
            return Err(UpstreamError::RelayProtocolError(format!(
                "relay advertises api version {} but {} is configured",
                info.v, self.api_version
            )));
        }
        if info.auth_required && self.auth_token.is_empty() {
            return Err(UpstreamError::RelayUnauthorized);
        }
        if info.limits.max_request_bytes < self.max_request_bytes
            || info.limits.per_item_max_wire_bytes < self.per_item_max_wire_bytes
            || info.limits.max_response_bytes < self.max_response_bytes
            || info.limits.max_items < 1
        {
            return Err(UpstreamError::RelayProtocolError(
                "relay-advertised limits are narrower than this configuration".to_string(),
            ));
        }
        Ok(())
    }

    fn map_err_code(code: &str) -> UpstreamError {
        match code {
            "bad_request" => UpstreamError::RelayProtocolError("bad_request".to_string()),
            "protocol_error" => UpstreamError::RelayProtocolError("protocol_error".to_string()),
            "upstream_error" => UpstreamError::RelayUpstreamError,
            "timeout" => UpstreamError::RelayTimeout,
            "unauthorized" => UpstreamError::RelayUnauthorized,
            "too_large" => UpstreamError::RelayTooLarge,
            "rate_limited" => UpstreamError::RelayRateLimited,
            "internal_error" => UpstreamError::RelayInternalError,
            other => UpstreamError::RelayProtocolError(format!("unrecognized err code: {other}")),
        }
    }

    async fn resolve_inner(&self, query: &[u8]) -> Result<Vec<u8>, UpstreamError> {
        if query.len() > self.per_item_max_wire_bytes {
            return Err(UpstreamError::RelayClientError(
                "query exceeds relay_per_item_max_wire_bytes".to_string(),
            ));
        }

        let req = DnsRequest {
            v: self.api_version,
            id: "single",
            items: vec![DnsItemRequest {
                id: BATCH_ITEM_ID,
                q: BASE64.encode(query),
            }],
        };
        let body = serde_json::to_vec(&req).map_err(|e| UpstreamError::RelayClientError(e.to_string()))?;
        if body.len() > self.max_request_bytes {
            return Err(UpstreamError::RelayClientError(
                "request exceeds relay_max_request_bytes".to_string(),
            ));
        }

        let mut request = self
            .client
            .post(&self.dns_url)
            .header("Content-Type", "application/json")
            .body(body);
        if !self.auth_token.is_empty() {
            request = request.bearer_auth(&self.auth_token);
        }

        let resp = request.send().await.map_err(|_| UpstreamError::RelayTimeout)?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::RelayUnauthorized);
        }
        if status.is_server_error() {
            return Err(UpstreamError::RelayUpstreamError);
        }
        if status.is_client_error() {
            return Err(UpstreamError::RelayClientError(format!("http {status}")));
        }
        if !status.is_success() {
            return Err(UpstreamError::RelayClientError(format!("unexpected http status {status}")));
        }

        let bytes = resp.bytes().await.map_err(|_| UpstreamError::RelayTimeout)?;
        if bytes.len() > self.max_response_bytes {
            return Err(UpstreamError::RelayTooLarge);
        }
        let parsed: DnsResponse =
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::RelayClientError(format!("malformed json: {e}")))?;

        let item = parsed
            .items
            .into_iter()
            .find(|i| i.id == BATCH_ITEM_ID)
            .ok_or_else(|| UpstreamError::RelayClientError("response missing the requested item".to_string()))?;

        if item.ok {
            let payload = item
                .a
                .ok_or_else(|| UpstreamError::RelayClientError("ok=true item missing its payload".to_string()))?;
            BASE64
                .decode(payload)
                .map_err(|_| UpstreamError::RelayProtocolError("item payload is not valid base64".to_string()))
        } else {
            Err(Self::map_err_code(item.err.as_deref().unwrap_or("protocol_error")))
        }
    }
}

#[async_trait]
impl UpstreamTransport for RelayTransport {
    async fn resolve(&self, wire_query: &[u8], deadline: Instant) -> Result<Vec<u8>, UpstreamError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(UpstreamError::RelayTimeout);
        }
        tokio::time::timeout(remaining, self.resolve_inner(wire_query))
            .await
            .map_err(|_| UpstreamError::RelayTimeout)?
    }
}
