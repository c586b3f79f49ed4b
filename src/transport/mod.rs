//! HTTP plumbing shared by the session manager and the request pipeline.

pub mod envelope;

pub use envelope::{Envelope, Outcome};

use crate::common::{ClientConfig, SessionError};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// One request, relative to the configured base URL
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append `params` in order
    pub fn query_pairs(self, params: &[(&str, &str)]) -> Self {
        params
            .iter()
            .fold(self, |spec, (key, value)| spec.query(*key, *value))
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Thin wrapper over a reqwest client bound to one gateway
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send `spec`, attaching `bearer` when given, and decode whatever comes back.
    /// Only transport failures are errors here; HTTP failures are in the Outcome.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        bearer: Option<&str>,
    ) -> Result<Outcome, SessionError> {
        let url = self.url(&spec.path);
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut builder = self
            .client
            .request(spec.method.clone(), &url)
            .header(REQUEST_ID_HEADER, &request_id);

        if let Some(token) = bearer.filter(|t| !t.is_empty()) {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => builder = builder.header(AUTHORIZATION, value),
                Err(_) => tracing::warn!(request_id = %request_id, "token is not a valid header value, sending unauthenticated"),
            }
        }
        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            tracing::debug!(
                request_id = %request_id,
                method = %spec.method,
                url = %url,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "request_failed"
            );
            e
        })?;

        let status = response.status();
        let raw = response.bytes().await?;
        let body = decode_body(&raw);

        tracing::debug!(
            request_id = %request_id,
            method = %spec.method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request_done"
        );

        Ok(Outcome::decode(status, body))
    }
}

/// Empty -> Null, non-JSON -> the text as a string
fn decode_body(raw: &[u8]) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(raw)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()))
}
