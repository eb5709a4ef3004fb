//! Authorization header composition.
//!
//! # Design
//! The composer stores the fields of every strategy so switching back and
//! forth does not lose what was typed; only the active strategy contributes.
//! Every change republishes the derived header on a `watch` channel, which is
//! how the owning session learns about it.
//!
//! OAuth2 client-credentials tokens are fetched only on explicit request. A
//! failed fetch is logged and otherwise ignored: the header simply stays
//! empty until a fetch succeeds.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::AuthError;
use crate::http::{send_blocking, HttpMethod, Transport};
use crate::request::RequestSpec;

pub const AUTHORIZATION: &str = "Authorization";

/// Auth contribution to a request: either nothing or one `Authorization`
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeader(Option<String>);

impl AuthHeader {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.as_deref().map(|v| (AUTHORIZATION, v)).into_iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthKind {
    #[default]
    None,
    Basic,
    Bearer,
    OAuth2,
}

/// The active strategy together with its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    OAuth2 {
        token_url: String,
        client_id: String,
        client_secret: String,
        acquired_token: Option<String>,
    },
}

impl AuthStrategy {
    pub fn kind(&self) -> AuthKind {
        match self {
            AuthStrategy::None => AuthKind::None,
            AuthStrategy::Basic { .. } => AuthKind::Basic,
            AuthStrategy::Bearer { .. } => AuthKind::Bearer,
            AuthStrategy::OAuth2 { .. } => AuthKind::OAuth2,
        }
    }

    pub fn header(&self) -> AuthHeader {
        match self {
            AuthStrategy::None => AuthHeader::none(),
            AuthStrategy::Basic { username, .. } if username.is_empty() => AuthHeader::none(),
            AuthStrategy::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                AuthHeader::new(format!("Basic {encoded}"))
            }
            AuthStrategy::Bearer { token } if token.is_empty() => AuthHeader::none(),
            AuthStrategy::Bearer { token } => AuthHeader::new(format!("Bearer {token}")),
            AuthStrategy::OAuth2 {
                acquired_token: Some(token),
                ..
            } => AuthHeader::new(format!("Bearer {token}")),
            AuthStrategy::OAuth2 {
                acquired_token: None,
                ..
            } => AuthHeader::none(),
        }
    }
}

#[derive(Debug, Default)]
struct AuthFields {
    active: AuthKind,
    basic_username: String,
    basic_password: String,
    bearer_token: String,
    oauth2_token_url: String,
    oauth2_client_id: String,
    oauth2_client_secret: String,
    oauth2_token: Option<String>,
}

impl AuthFields {
    fn strategy(&self) -> AuthStrategy {
        match self.active {
            AuthKind::None => AuthStrategy::None,
            AuthKind::Basic => AuthStrategy::Basic {
                username: self.basic_username.clone(),
                password: self.basic_password.clone(),
            },
            AuthKind::Bearer => AuthStrategy::Bearer {
                token: self.bearer_token.clone(),
            },
            AuthKind::OAuth2 => AuthStrategy::OAuth2 {
                token_url: self.oauth2_token_url.clone(),
                client_id: self.oauth2_client_id.clone(),
                client_secret: self.oauth2_client_secret.clone(),
                acquired_token: self.oauth2_token.clone(),
            },
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug)]
pub struct AuthComposer {
    fields: Mutex<AuthFields>,
    header_tx: watch::Sender<AuthHeader>,
}

impl AuthComposer {
    pub fn new() -> Self {
        let (header_tx, _) = watch::channel(AuthHeader::none());
        Self {
            fields: Mutex::new(AuthFields::default()),
            header_tx,
        }
    }

    /// Receiver that always holds the latest header.
    pub fn subscribe(&self) -> watch::Receiver<AuthHeader> {
        self.header_tx.subscribe()
    }

    pub fn current_header(&self) -> AuthHeader {
        self.lock().strategy().header()
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.lock().strategy()
    }

    pub fn set_strategy(&self, kind: AuthKind) {
        self.update(|f| f.active = kind);
    }

    pub fn set_basic_username(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|f| f.basic_username = value);
    }

    pub fn set_basic_password(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|f| f.basic_password = value);
    }

    pub fn set_bearer_token(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|f| f.bearer_token = value);
    }

    pub fn set_oauth2_token_url(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|f| f.oauth2_token_url = value);
    }

    pub fn set_oauth2_client_id(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|f| f.oauth2_client_id = value);
    }

    pub fn set_oauth2_client_secret(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|f| f.oauth2_client_secret = value);
    }

    /// Fetch a client-credentials token and store it for the OAuth2 strategy.
    ///
    /// Failures are logged and leave any previously acquired token in place.
    /// The error is returned for callers that want it; ignoring it is fine.
    pub async fn acquire_oauth2_token(
        &self,
        transport: &Arc<dyn Transport>,
    ) -> Result<(), AuthError> {
        let request = {
            let f = self.lock();
            token_request(
                &f.oauth2_token_url,
                &f.oauth2_client_id,
                &f.oauth2_client_secret,
            )
        };

        let token = match request {
            Ok(request) => fetch_token(transport, request).await,
            Err(e) => Err(e),
        };

        match token {
            Ok(token) => {
                info!("OAuth2 token acquired");
                self.update(|f| f.oauth2_token = Some(token));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "OAuth2 token error");
                Err(e)
            }
        }
    }

    fn update(&self, apply: impl FnOnce(&mut AuthFields)) {
        let mut fields = self.lock();
        apply(&mut fields);
        let header = fields.strategy().header();
        debug!(kind = ?fields.active, has_header = !header.is_empty(), "auth changed");
        // Published under the lock so receivers observe changes in order.
        self.header_tx.send_replace(header);
    }

    fn lock(&self) -> MutexGuard<'_, AuthFields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AuthComposer {
    fn default() -> Self {
        Self::new()
    }
}

fn token_request(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<RequestSpec, AuthError> {
    if token_url.trim().is_empty() {
        return Err(AuthError::MissingTokenUrl);
    }
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", client_id)
        .append_pair("client_secret", client_secret)
        .finish();
    Ok(RequestSpec {
        url: token_url.to_string(),
        method: HttpMethod::Post,
        headers: vec![(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )],
        body: Some(body),
    })
}

async fn fetch_token(
    transport: &Arc<dyn Transport>,
    request: RequestSpec,
) -> Result<String, AuthError> {
    let response = send_blocking(transport, request).await?;
    if !response.is_success() {
        return Err(AuthError::Status {
            status: response.status,
        });
    }
    let parsed: TokenResponse = serde_json::from_str(&response.body)?;
    parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingAccessToken)
}
