//! End-to-end request lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port in its own thread and runtime,
//! then drives a `RequestSession` over real HTTP through `UreqTransport`.
//! History goes to a temp directory so restarts can be simulated by
//! reopening the store.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use courier_core::{
    AuthKind, FileStorage, HeaderField, HistoryStore, HttpMethod, Outcome, RequestSession,
    ResponseView, SessionState, Transport, UreqTransport,
};
use mock_server::{Echo, ACCESS_TOKEN, CLIENT_ID, CLIENT_SECRET};
use pretty_assertions::assert_eq;

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

#[derive(Default)]
struct Captured {
    response: Mutex<Option<(String, String)>>,
    error: Mutex<Option<String>>,
}

impl ResponseView for Captured {
    fn on_loading(&self) {
        *self.response.lock().unwrap() = None;
        *self.error.lock().unwrap() = None;
    }

    fn on_response(&self, body: &str, content_type: &str) {
        *self.response.lock().unwrap() = Some((body.to_string(), content_type.to_string()));
    }

    fn on_error(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }
}

struct Harness {
    addr: SocketAddr,
    dir: tempfile::TempDir,
    session: RequestSession,
    view: Arc<Captured>,
}

impl Harness {
    fn new() -> Self {
        let addr = start_server();
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(HistoryStore::open(FileStorage::in_dir(dir.path())));
        let view = Arc::new(Captured::default());
        let transport: Arc<dyn Transport> = Arc::new(UreqTransport::new());
        let session = RequestSession::new(transport, history, Arc::clone(&view));
        Self {
            addr,
            dir,
            session,
            view,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn reopen_history(&self) -> HistoryStore {
        HistoryStore::open(FileStorage::in_dir(self.dir.path()))
    }
}

#[tokio::test]
async fn json_success_is_pretty_printed_and_recorded() {
    let h = Harness::new();
    h.session.set_url(h.url("/api"));

    let result = h.session.submit().await;

    assert_eq!(h.session.state(), SessionState::Success);
    assert_eq!(result.status, Some(200));
    assert!(result.content_type.contains("application/json"));
    let expected = "{\n  \"message\": \"hello\",\n  \"items\": [\n    1,\n    2,\n    3\n  ]\n}";
    assert_eq!(result.body.as_deref(), Some(expected));
    let (body, content_type) = h.view.response.lock().unwrap().clone().unwrap();
    assert_eq!(body, expected);
    assert_eq!(content_type, result.content_type);

    let history = h.session.history().all();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].url, h.url("/api"));
    assert_eq!(history[0].method, HttpMethod::Get);
}

#[tokio::test]
async fn plain_text_and_broken_json_pass_through() {
    let h = Harness::new();

    h.session.set_url(h.url("/text"));
    let result = h.session.submit().await;
    assert_eq!(result.body.as_deref(), Some("plain text body"));
    assert!(result.content_type.starts_with("text/plain"));

    h.session.set_url(h.url("/broken-json"));
    let result = h.session.submit().await;
    assert_eq!(result.outcome(), Outcome::Success);
    assert_eq!(result.body.as_deref(), Some(r#"{"unterminated": "#));
    assert_eq!(result.content_type, "application/json");
}

#[tokio::test]
async fn bodies_past_ten_mebibytes_are_read_in_full() {
    let h = Harness::new();
    let len = 11 * 1024 * 1024;
    h.session.set_url(h.url(&format!("/bytes/{len}")));

    let result = h.session.submit().await;

    assert_eq!(result.error_message, None);
    assert_eq!(result.status, Some(200));
    assert_eq!(h.session.state(), SessionState::Success);
    assert_eq!(result.body.map(|b| b.len()), Some(len));
    assert_eq!(h.session.history().len(), 1);
}

#[tokio::test]
async fn http_error_is_classified_and_recorded() {
    let h = Harness::new();
    h.session.set_url(h.url("/status/404"));

    let result = h.session.submit().await;

    assert_eq!(h.session.state(), SessionState::Error);
    assert_eq!(result.status, Some(404));
    let message = result.error_message.unwrap();
    assert!(message.starts_with("HTTP 404"), "{message}");
    assert_eq!(h.view.error.lock().unwrap().as_deref(), Some(message.as_str()));
    assert_eq!(h.session.history().len(), 1);
}

#[tokio::test]
async fn transport_failure_leaves_history_alone() {
    let h = Harness::new();
    h.session.set_url("http://127.0.0.1:1/");

    let result = h.session.submit().await;

    assert_eq!(h.session.state(), SessionState::Error);
    assert_eq!(result.status, None);
    assert!(!result.error_message.unwrap().is_empty());
    assert!(h.session.history().is_empty());
    assert!(h.reopen_history().is_empty());
}

#[tokio::test]
async fn headers_auth_and_body_reach_the_server() {
    let h = Harness::new();
    h.session.set_url(h.url("/echo"));
    h.session.set_method(HttpMethod::Put);
    h.session.set_body(r#"{"name":"x""#);
    h.session.set_header(0, HeaderField::Key, " X-Trace ");
    h.session.set_header(0, HeaderField::Value, " abc ");
    h.session.add_header();
    h.session.set_header(1, HeaderField::Key, "Authorization");
    h.session.set_header(1, HeaderField::Value, "X");
    h.session.auth().set_strategy(AuthKind::Basic);
    h.session.auth().set_basic_username("user");
    h.session.auth().set_basic_password("pass");

    let result = h.session.submit().await;

    let echo: Echo = serde_json::from_str(result.body.as_deref().unwrap()).unwrap();
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.headers["x-trace"], "abc");
    assert_eq!(echo.headers["authorization"], "Basic dXNlcjpwYXNz");
    assert_eq!(echo.body, r#"{"name":"x""#);
}

#[tokio::test]
async fn oauth2_token_is_acquired_then_applied() {
    let h = Harness::new();
    let auth = h.session.auth();
    auth.set_strategy(AuthKind::OAuth2);
    auth.set_oauth2_token_url(h.url("/oauth/token"));
    auth.set_oauth2_client_id(CLIENT_ID);
    auth.set_oauth2_client_secret("wrong");

    assert!(h.session.acquire_oauth2_token().await.is_err());
    assert!(auth.current_header().is_empty());

    auth.set_oauth2_client_secret(CLIENT_SECRET);
    h.session.acquire_oauth2_token().await.unwrap();

    h.session.set_url(h.url("/echo"));
    let result = h.session.submit().await;
    let echo: Echo = serde_json::from_str(result.body.as_deref().unwrap()).unwrap();
    assert_eq!(
        echo.headers["authorization"],
        format!("Bearer {ACCESS_TOKEN}")
    );
}

#[tokio::test]
async fn newer_submission_wins_over_slower_one() {
    let h = Harness::new();
    h.session.set_url(h.url("/slow/300"));
    let slow = h.session.submit();
    h.session.set_url(h.url("/api"));
    let fast = h.session.submit();

    let (slow_result, fast_result) = tokio::join!(slow, fast);

    assert_eq!(slow_result.status, Some(200));
    assert_eq!(h.session.result(), fast_result);
    assert_eq!(h.session.history().len(), 2);
    assert_eq!(h.session.history().all()[0].url, h.url("/slow/300"));
}

#[tokio::test]
async fn history_persists_and_clears_across_restarts() {
    let h = Harness::new();
    for n in 0..5 {
        h.session.set_url(h.url(&format!("/status/{}", 200 + n)));
        h.session.submit().await;
    }
    assert_eq!(h.reopen_history().len(), 5);

    h.session.history().clear().unwrap();
    assert!(h.session.history().all().is_empty());
    assert!(h.reopen_history().all().is_empty());
}
