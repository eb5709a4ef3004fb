use std::{collections::BTreeMap, time::Duration};

use axum::{
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode},
    routing::{any, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const CLIENT_ID: &str = "courier";
pub const CLIENT_SECRET: &str = "s3cret";
pub const ACCESS_TOKEN: &str = "mock-access-token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

pub fn app() -> Router {
    Router::new()
        .route("/api", get(api))
        .route("/text", get(text))
        .route("/broken-json", get(broken_json))
        .route("/status/{code}", any(status))
        .route("/echo", any(echo))
        .route("/slow/{ms}", get(slow))
        .route("/bytes/{len}", get(bytes))
        .route("/oauth/token", post(token))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn api() -> Json<Value> {
    Json(json!({ "message": "hello", "items": [1, 2, 3] }))
}

async fn text() -> ([(header::HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "plain text body")
}

async fn broken_json() -> ([(header::HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "application/json")], r#"{"unterminated": "#)
}

async fn status(Path(code): Path<u16>) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(json!({ "status": status.as_u16() })))
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        headers,
        body,
    })
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "delay_ms": ms }))
}

/// `len` bytes of plain text.
async fn bytes(Path(len): Path<usize>) -> ([(header::HeaderName, &'static str); 1], String) {
    ([(header::CONTENT_TYPE, "text/plain")], "a".repeat(len))
}

async fn token(
    Form(input): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<Value>)> {
    if input.grant_type != "client_credentials" {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        ));
    }
    if input.client_id != CLIENT_ID || input.client_secret != CLIENT_SECRET {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client" })),
        ));
    }
    Ok(Json(TokenResponse {
        access_token: ACCESS_TOKEN.to_string(),
        token_type: "bearer".to_string(),
        expires_in: 3600,
    }))
}
