//! The request lifecycle: form state, submit, and result delivery.
//!
//! # Design
//! `RequestSession` owns the editable form, the auth composer and the
//! current result. `submit` performs the `Idle -> Loading` transition
//! synchronously, before the returned future is first polled. That
//! transition is the only place prior results are cleared.
//!
//! Each dispatch is tagged with a generation number. When submissions
//! overlap, a resolution that is no longer the latest is dropped: it does not
//! touch the result fields or the view. It is still written to history when
//! a response was obtained, since that request did happen.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::auth::{AuthComposer, AuthHeader};
use crate::error::AuthError;
use crate::executor::{ExecutionResult, HttpExecutor, Outcome};
use crate::headers::{HeaderField, HeaderSet};
use crate::history::{HistoryEntry, HistoryStore};
use crate::http::{HttpMethod, Transport};
use crate::request;

/// Value-delivery points for a presentation layer. All default to no-ops.
pub trait ResponseView: Send + Sync {
    fn on_loading(&self) {}
    fn on_response(&self, _body: &str, _content_type: &str) {}
    fn on_error(&self, _message: &str) {}
    fn on_status(&self, _status: Option<u16>) {}
    fn on_duration(&self, _duration_ms: Option<u64>) {}
}

impl<V: ResponseView + ?Sized> ResponseView for Arc<V> {
    fn on_loading(&self) {
        (**self).on_loading()
    }

    fn on_response(&self, body: &str, content_type: &str) {
        (**self).on_response(body, content_type)
    }

    fn on_error(&self, message: &str) {
        (**self).on_error(message)
    }

    fn on_status(&self, status: Option<u16>) {
        (**self).on_status(status)
    }

    fn on_duration(&self, duration_ms: Option<u64>) {
        (**self).on_duration(duration_ms)
    }
}

/// A view that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopView;

impl ResponseView for NoopView {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// What the user is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestForm {
    pub url: String,
    pub method: HttpMethod,
    pub body: String,
    pub headers: HeaderSet,
}

impl Default for RequestForm {
    fn default() -> Self {
        Self {
            url: "https://".to_string(),
            method: HttpMethod::Get,
            body: String::new(),
            headers: HeaderSet::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    state: SessionState,
    result: ExecutionResult,
    generation: u64,
}

pub struct RequestSession {
    form: Mutex<RequestForm>,
    auth: AuthComposer,
    auth_header: watch::Receiver<AuthHeader>,
    executor: HttpExecutor,
    history: Arc<HistoryStore>,
    view: Box<dyn ResponseView>,
    progress: Mutex<Progress>,
}

impl RequestSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        history: Arc<HistoryStore>,
        view: impl ResponseView + 'static,
    ) -> Self {
        let auth = AuthComposer::new();
        let auth_header = auth.subscribe();
        Self {
            form: Mutex::new(RequestForm::default()),
            auth,
            auth_header,
            executor: HttpExecutor::new(transport),
            history,
            view: Box::new(view),
            progress: Mutex::new(Progress::default()),
        }
    }

    pub fn auth(&self) -> &AuthComposer {
        &self.auth
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn form(&self) -> RequestForm {
        self.form_guard().clone()
    }

    pub fn state(&self) -> SessionState {
        self.progress_guard().state
    }

    pub fn result(&self) -> ExecutionResult {
        self.progress_guard().result.clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.form_guard().url = url.into();
    }

    /// Switching to GET discards the body and resets the header rows.
    pub fn set_method(&self, method: HttpMethod) {
        let mut form = self.form_guard();
        form.method = method;
        if method == HttpMethod::Get {
            form.body.clear();
            form.headers.reset();
        }
    }

    /// Ignored while the method is GET.
    pub fn set_body(&self, body: impl Into<String>) {
        let mut form = self.form_guard();
        if form.method != HttpMethod::Get {
            form.body = body.into();
        }
    }

    pub fn add_header(&self) {
        self.form_guard().headers.add();
    }

    pub fn remove_header(&self, index: usize) {
        self.form_guard().headers.remove(index);
    }

    pub fn set_header(&self, index: usize, field: HeaderField, value: impl Into<String>) -> bool {
        self.form_guard().headers.set(index, field, value)
    }

    /// Load a history entry back into the form.
    pub fn select_history(&self, entry: &HistoryEntry) {
        let mut form = self.form_guard();
        form.url = entry.url.clone();
        form.method = entry.method;
        form.headers = HeaderSet::from_entries(entry.headers.clone());
        form.body = entry.body.clone().unwrap_or_default();
        if form.method == HttpMethod::Get {
            form.body.clear();
            form.headers.reset();
        }
    }

    /// Fetch an OAuth2 client-credentials token through this session's
    /// transport. Independent of `submit`; see `AuthComposer`.
    pub async fn acquire_oauth2_token(&self) -> Result<(), AuthError> {
        self.auth
            .acquire_oauth2_token(self.executor.transport())
            .await
    }

    /// Enter `Loading` now and return the pending dispatch.
    ///
    /// The future resolves to this dispatch's result even if a newer
    /// submission has since replaced it as the session's current result.
    pub fn submit(&self) -> impl Future<Output = ExecutionResult> + '_ {
        let form = self.form();
        let auth = self.auth_header.borrow().clone();
        let spec = request::build(
            &form.url,
            form.method,
            form.headers.entries(),
            &auth,
            Some(form.body.as_str()),
        );
        let generation = self.begin_loading();

        async move {
            let result = self.executor.execute(&spec).await;
            if result.responded() {
                self.record(HistoryEntry::record(&spec, form.headers.entries()))
                    .await;
            }
            self.settle(generation, &result);
            result
        }
    }

    /// History writes are file IO, so they run on the blocking pool like the
    /// transport does. Failures never change the request's outcome.
    async fn record(&self, entry: HistoryEntry) {
        let history = Arc::clone(&self.history);
        match tokio::task::spawn_blocking(move || history.append(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to record request history"),
            Err(e) => warn!(error = %e, "history write task failed"),
        }
    }

    fn begin_loading(&self) -> u64 {
        let generation = {
            let mut progress = self.progress_guard();
            progress.generation += 1;
            progress.state = SessionState::Loading;
            progress.result = ExecutionResult::default();
            progress.generation
        };
        self.view.on_loading();
        generation
    }

    fn settle(&self, generation: u64, result: &ExecutionResult) {
        {
            let mut progress = self.progress_guard();
            if progress.generation != generation {
                debug!(
                    generation,
                    latest = progress.generation,
                    "discarding stale response"
                );
                return;
            }
            progress.state = match result.outcome() {
                Outcome::Success => SessionState::Success,
                _ => SessionState::Error,
            };
            progress.result = result.clone();
        }

        self.view.on_duration(result.duration_ms);
        self.view.on_status(result.status);
        match (&result.error_message, &result.body) {
            (Some(message), _) => self.view.on_error(message),
            (None, Some(body)) => self.view.on_response(body, &result.content_type),
            (None, None) => {}
        }
    }

    fn form_guard(&self) -> MutexGuard<'_, RequestForm> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn progress_guard(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
