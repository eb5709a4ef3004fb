//! HTTP transport types and the blocking transport seam.
//!
//! # Design
//! Requests and responses are plain data. The `Transport` trait is the only
//! place that touches the network, so the executor, the OAuth2 token call and
//! the session can all be driven by a scripted transport in tests.
//! `UreqTransport` is the production implementation; it is blocking and the
//! executor moves it onto tokio's blocking pool.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::request::RequestSpec;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown method: {s}"))
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase for `status`; empty when none is known.
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Set when the status line arrived but the body could not be read in
    /// full. `body` is empty in that case.
    pub body_error: Option<String>,
    /// When the status line and headers arrived, if the transport knows.
    pub received_at: Option<Instant>,
}

impl HttpResponse {
    pub fn new(
        status: u16,
        reason: impl Into<String>,
        headers: Vec<(String, String)>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers,
            body: body.into(),
            body_error: None,
            received_at: None,
        }
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared content type, or the empty string.
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one blocking HTTP round-trip.
///
/// Any `Ok` means a response was obtained, whatever its status.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a ureq agent.
///
/// Status codes are returned as data rather than `Err`, so 4xx/5xx reach the
/// executor's classification. No timeout beyond ureq's defaults is set.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError> {
        let agent = &self.agent;
        let url = request.url.as_str();
        let headers = request.headers.as_slice();

        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(agent.get(url), headers).call(),
            (HttpMethod::Delete, None) => with_headers(agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(body)) => with_headers(agent.delete(url), headers)
                .force_send_body()
                .send(body.as_bytes()),
            (HttpMethod::Post, Some(body)) => {
                with_headers(agent.post(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(agent.put(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(agent.put(url), headers).send_empty(),
            (HttpMethod::Patch, Some(body)) => {
                with_headers(agent.patch(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Patch, None) => with_headers(agent.patch(url), headers).send_empty(),
        };

        let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;
        let received_at = Instant::now();

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // The whole body is wanted, however large; ureq caps reads at 10 MiB
        // by default.
        let (body, body_error) = match response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
        {
            Ok(body) => (body, None),
            Err(e) => (String::new(), Some(e.to_string())),
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            body_error,
            received_at: Some(received_at),
        })
    }
}

/// Run one `Transport::send` on the blocking pool.
pub(crate) async fn send_blocking(
    transport: &Arc<dyn Transport>,
    request: RequestSpec,
) -> Result<HttpResponse, TransportError> {
    let transport = Arc::clone(transport);
    tokio::task::spawn_blocking(move || transport.send(&request))
        .await
        .map_err(|e| TransportError::new(format!("transport task failed: {e}")))?
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
