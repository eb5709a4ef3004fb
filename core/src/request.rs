//! Assembly of the outbound request.
//!
//! `build` is pure: it folds the edited header rows, the auth contribution
//! and the body into one `RequestSpec`, and normalizes the URL.

use crate::auth::AuthHeader;
use crate::headers::HeaderEntry;
use crate::http::HttpMethod;

/// A fully assembled, ready-to-send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    /// Ordered mapping; no two names are equal ignoring ASCII case.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestSpec {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Prefix `https://` unless the URL already starts with `http://` or
/// `https://`. Idempotent.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

pub fn build(
    url: &str,
    method: HttpMethod,
    entries: &[HeaderEntry],
    auth: &AuthHeader,
    body: Option<&str>,
) -> RequestSpec {
    let mut headers = Vec::new();
    for entry in entries {
        let key = entry.key.trim();
        if key.is_empty() {
            continue;
        }
        insert_header(&mut headers, key, entry.value.trim());
    }
    // Auth goes last so it overrides a custom header of the same name.
    for (name, value) in auth.iter() {
        insert_header(&mut headers, name, value);
    }

    let body = match method {
        HttpMethod::Get => None,
        _ => body.filter(|b| !b.is_empty()).map(str::to_string),
    };

    RequestSpec {
        url: normalize_url(url),
        method,
        headers,
        body,
    }
}

fn insert_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(slot) => *slot = (name.to_string(), value.to_string()),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
