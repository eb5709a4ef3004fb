//! Request execution and response classification.
//!
//! # Design
//! `HttpExecutor` times one round-trip and folds the response into an
//! `ExecutionResult`. Only a transport failure leaves `status` unset; a
//! non-2xx response is an error outcome that still carries its status, and
//! a 2xx body that is not JSON is shown as-is rather than treated as an
//! error.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::http::{send_blocking, HttpResponse, Transport};
use crate::request::RequestSpec;

/// Reason text used when the response has none.
pub const FALLBACK_REASON: &str = "Something went wrong";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing has resolved yet.
    Pending,
    Success,
    /// A response arrived but is unusable: non-2xx status, or a body that
    /// could not be read.
    HttpError,
    /// No response was obtained.
    TransportFailure,
}

/// Fields a view renders after one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: Option<u16>,
    pub duration_ms: Option<u64>,
    pub body: Option<String>,
    pub content_type: String,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn outcome(&self) -> Outcome {
        match (self.status, &self.error_message, &self.body) {
            (None, Some(_), _) => Outcome::TransportFailure,
            (Some(_), Some(_), _) => Outcome::HttpError,
            (Some(_), None, Some(_)) => Outcome::Success,
            _ => Outcome::Pending,
        }
    }

    /// Whether a response was obtained, i.e. the request should be recorded.
    pub fn responded(&self) -> bool {
        self.status.is_some()
    }

    fn transport_failure(message: String, duration_ms: u64) -> Self {
        Self {
            status: None,
            duration_ms: Some(duration_ms),
            body: None,
            content_type: String::new(),
            error_message: Some(message),
        }
    }

    fn from_response(response: HttpResponse, duration_ms: u64) -> Self {
        let content_type = response.content_type().to_string();
        if !response.is_success() {
            let reason = if response.reason.is_empty() {
                FALLBACK_REASON
            } else {
                response.reason.as_str()
            };
            return Self {
                status: Some(response.status),
                duration_ms: Some(duration_ms),
                body: None,
                content_type,
                error_message: Some(format!("HTTP {}: {reason}", response.status)),
            };
        }
        if let Some(e) = response.body_error {
            return Self {
                status: Some(response.status),
                duration_ms: Some(duration_ms),
                body: None,
                content_type,
                error_message: Some(format!("failed to read response body: {e}")),
            };
        }
        Self {
            status: Some(response.status),
            duration_ms: Some(duration_ms),
            body: Some(render_body(response.body)),
            content_type,
            error_message: None,
        }
    }
}

/// Pretty-print `raw` if it is JSON, otherwise return it unchanged.
///
/// Indentation is two spaces and object keys keep the server's order.
pub fn render_body(raw: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(raw),
        Err(_) => raw,
    }
}

#[derive(Clone)]
pub struct HttpExecutor {
    transport: Arc<dyn Transport>,
}

impl HttpExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn execute(&self, spec: &RequestSpec) -> ExecutionResult {
        debug!(method = %spec.method, url = %spec.url, "dispatching request");
        let start = Instant::now();
        let response = send_blocking(&self.transport, spec.clone()).await;
        let finished = Instant::now();

        match response {
            Ok(response) => {
                // Time to headers; reading the body is not counted.
                let duration_ms = elapsed_ms(start, response.received_at.unwrap_or(finished));
                info!(
                    method = %spec.method,
                    url = %spec.url,
                    status = response.status,
                    duration_ms,
                    "request completed"
                );
                ExecutionResult::from_response(response, duration_ms)
            }
            Err(e) => {
                let duration_ms = elapsed_ms(start, finished);
                info!(
                    method = %spec.method,
                    url = %spec.url,
                    error = %e,
                    duration_ms,
                    "request failed"
                );
                ExecutionResult::transport_failure(e.to_string(), duration_ms)
            }
        }
    }
}

fn elapsed_ms(start: Instant, end: Instant) -> u64 {
    (end.saturating_duration_since(start).as_secs_f64() * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http::HttpMethod;
    use pretty_assertions::assert_eq;

    struct Canned(Result<HttpResponse, TransportError>);

    impl Transport for Canned {
        fn send(&self, _request: &RequestSpec) -> Result<HttpResponse, TransportError> {
            self.0.clone()
        }
    }

    fn response(status: u16, reason: &str, content_type: &str, body: &str) -> HttpResponse {
        HttpResponse::new(
            status,
            reason,
            vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        )
    }

    fn spec() -> RequestSpec {
        RequestSpec {
            url: "https://example.com/api".to_string(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
        }
    }

    async fn run(reply: Result<HttpResponse, TransportError>) -> ExecutionResult {
        HttpExecutor::new(Arc::new(Canned(reply))).execute(&spec()).await
    }

    #[tokio::test]
    async fn json_success_is_pretty_printed() {
        let result = run(Ok(response(
            200,
            "OK",
            "application/json; charset=utf-8",
            r#"{"b":1,"a":[true,null]}"#,
        )))
        .await;

        assert_eq!(result.outcome(), Outcome::Success);
        assert_eq!(result.status, Some(200));
        assert_eq!(result.content_type, "application/json; charset=utf-8");
        assert_eq!(
            result.body.as_deref(),
            Some("{\n  \"b\": 1,\n  \"a\": [\n    true,\n    null\n  ]\n}")
        );
        assert_eq!(result.error_message, None);
        assert!(result.duration_ms.is_some());
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_raw_text() {
        let result = run(Ok(response(200, "OK", "application/json", "{oops"))).await;
        assert_eq!(result.outcome(), Outcome::Success);
        assert_eq!(result.body.as_deref(), Some("{oops"));
    }

    #[tokio::test]
    async fn non_2xx_is_an_error_with_status() {
        let result = run(Ok(response(404, "Not Found", "text/plain", "missing"))).await;
        assert_eq!(result.outcome(), Outcome::HttpError);
        assert_eq!(result.status, Some(404));
        assert_eq!(result.body, None);
        assert_eq!(result.error_message.as_deref(), Some("HTTP 404: Not Found"));
        assert!(result.responded());
    }

    #[tokio::test]
    async fn empty_reason_uses_fallback() {
        let result = run(Ok(response(599, "", "", ""))).await;
        assert_eq!(
            result.error_message.as_deref(),
            Some("HTTP 599: Something went wrong")
        );
    }

    #[tokio::test]
    async fn transport_failure_has_no_status() {
        let result = run(Err(TransportError::new("dns error"))).await;
        assert_eq!(result.outcome(), Outcome::TransportFailure);
        assert_eq!(result.status, None);
        assert_eq!(result.body, None);
        assert_eq!(result.error_message.as_deref(), Some("dns error"));
        assert!(result.duration_ms.is_some());
        assert!(!result.responded());
    }

    #[test]
    fn rendering_is_deterministic() {
        let raw = r#"{"z":{"y":[1,2]},"x":"s"}"#.to_string();
        assert_eq!(render_body(raw.clone()), render_body(raw));
        assert_eq!(render_body("plain".to_string()), "plain");
    }

    #[tokio::test]
    async fn unreadable_body_still_counts_as_a_response() {
        let mut reply = response(200, "OK", "text/plain", "");
        reply.body_error = Some("the response body is larger than request limit".to_string());

        let result = run(Ok(reply)).await;

        assert_eq!(result.status, Some(200));
        assert_eq!(result.outcome(), Outcome::HttpError);
        assert_eq!(result.body, None);
        assert_eq!(
            result.error_message.as_deref(),
            Some("failed to read response body: the response body is larger than request limit")
        );
        assert!(result.responded());
    }

    /// Headers arrive at once; the body takes a while.
    struct SlowBody;

    impl Transport for SlowBody {
        fn send(&self, _request: &RequestSpec) -> Result<HttpResponse, TransportError> {
            let mut reply = response(200, "OK", "text/plain", "done");
            reply.received_at = Some(Instant::now());
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(reply)
        }
    }

    #[tokio::test]
    async fn duration_stops_when_headers_arrive() {
        let result = HttpExecutor::new(Arc::new(SlowBody)).execute(&spec()).await;

        assert_eq!(result.body.as_deref(), Some("done"));
        let duration_ms = result.duration_ms.unwrap();
        assert!(duration_ms < 300, "{duration_ms}");
    }

    #[test]
    fn default_result_is_pending() {
        assert_eq!(ExecutionResult::default().outcome(), Outcome::Pending);
    }
}
