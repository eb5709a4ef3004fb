//! Request engine for the Courier HTTP tool.
//!
//! # Overview
//! A user edits a request (URL, method, header rows, body, auth), submits
//! it, and gets back a classified result: status, duration, content type and
//! a renderable body, or an error message. Every request that obtained a
//! response is kept in a small persisted history.
//!
//! # Design
//! - `request::build` is pure; the network sits behind the `Transport`
//!   trait, so everything above it runs against scripted transports in tests.
//! - `HttpExecutor` times and classifies a single round-trip.
//! - `AuthComposer` derives the `Authorization` header from one active
//!   strategy and publishes every change on a watch channel.
//! - `HistoryStore` is newest-first, capped at 20, rewritten wholesale, with
//!   explicit observer registration.
//! - `RequestSession` ties these together and owns the
//!   `Idle -> Loading -> Success | Error` state machine.

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod headers;
pub mod history;
pub mod http;
pub mod request;
pub mod session;

pub use auth::{AuthComposer, AuthHeader, AuthKind, AuthStrategy};
pub use config::Config;
pub use error::{AuthError, ConfigError, HistoryError, TransportError};
pub use executor::{ExecutionResult, HttpExecutor, Outcome};
pub use headers::{HeaderEntry, HeaderField, HeaderSet};
pub use history::{FileStorage, HistoryEntry, HistoryStorage, HistoryStore, MemoryStorage};
pub use http::{HttpMethod, HttpResponse, Transport, UreqTransport};
pub use request::{normalize_url, RequestSpec};
pub use session::{NoopView, RequestForm, RequestSession, ResponseView, SessionState};
