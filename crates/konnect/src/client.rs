//! Konnect HTTP transport
//!
//! Adapters speak JSON to Konnect through the [`KonnectApi`] trait so the
//! same adapter code runs against [`HttpClient`] in production and
//! [`MemoryApi`](crate::MemoryApi) in tests.

use crate::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;

/// Default Konnect API endpoint (US region).
pub const DEFAULT_BASE_URL: &str = "https://us.api.konghq.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body echoed into messages.
const MAX_ERROR_BODY: usize = 512;

/// JSON transport to the Konnect API
///
/// Paths are absolute API paths such as `/v3/portals`. Query pairs are
/// appended URL-encoded.
pub trait KonnectApi: Send + Sync {
    /// GET a resource or collection. `Ok(None)` on 404.
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<Value>>;

    /// POST a JSON body, returning the response body.
    fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// PATCH a JSON body, returning the response body.
    fn patch(&self, path: &str, body: &Value) -> Result<Value>;

    /// PUT a JSON body, returning the response body.
    fn put(&self, path: &str, body: &Value) -> Result<Value>;

    /// DELETE a resource.
    fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()>;
}

/// Konnect client over HTTPS
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a client for the default endpoint.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_options(token, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom endpoint and timeout.
    pub fn with_options(token: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Turn a response into its JSON body, or an error for 4xx/5xx.
    fn read_body(
        method: &str,
        path: &str,
        mut response: ureq::http::Response<ureq::Body>,
    ) -> Result<Option<Value>> {
        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;
        log::debug!("{method} {path} -> {status}");

        if status >= 400 {
            if method == "GET" && status == 404 {
                return Ok(None);
            }
            return Err(Error::http(status, error_message(&text)));
        }

        if text.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn expect_body(method: &str, path: &str, body: Option<Value>) -> Result<Value> {
        body.ok_or_else(|| Error::InvalidResponse(format!("{method} {path} returned no body")))
    }
}

impl KonnectApi for HttpClient {
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let mut request = self
            .agent
            .get(&self.url(path))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json");
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let response = request.call()?;
        Self::read_body("GET", path, response)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .agent
            .post(&self.url(path))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .send_json(body)?;
        let body = Self::read_body("POST", path, response)?;
        Self::expect_body("POST", path, body)
    }

    fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .agent
            .patch(&self.url(path))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .send_json(body)?;
        let body = Self::read_body("PATCH", path, response)?;
        Self::expect_body("PATCH", path, body)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .agent
            .put(&self.url(path))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .send_json(body)?;
        let body = Self::read_body("PUT", path, response)?;
        Self::expect_body("PUT", path, body)
    }

    fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let mut request = self
            .agent
            .delete(&self.url(path))
            .header("Authorization", &self.authorization());
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let response = request.call()?;
        Self::read_body("DELETE", path, response).map(|_| ())
    }
}

/// Extract a readable message from a Konnect error body.
///
/// Konnect answers with problem+json (`title`, `detail`, `invalid_parameters`).
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return truncate(body.trim());
    };

    let mut message = value
        .get("detail")
        .and_then(Value::as_str)
        .or_else(|| value.get("title").and_then(Value::as_str))
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map_or_else(|| truncate(body.trim()), ToString::to_string);

    if let Some(params) = value.get("invalid_parameters").and_then(Value::as_array) {
        let details: Vec<String> = params
            .iter()
            .filter_map(|p| {
                let field = p.get("field").and_then(Value::as_str)?;
                let reason = p.get("reason").and_then(Value::as_str).unwrap_or("invalid");
                Some(format!("{field}: {reason}"))
            })
            .collect();
        if !details.is_empty() {
            message = format!("{message} ({})", details.join(", "));
        }
    }
    message
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
