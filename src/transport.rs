//! Transport sink: the abstract boundary between chat translators and the
//! wire. A `Provider` handle owns its `Transport` exclusively unless the
//! caller injects a shared one.
//!
//! `ReqwestTransport` is the default implementation, tuning
//! `reqwest::ClientBuilder` for connection keep-alive, a short pool idle
//! timeout to track DNS changes, and TCP no-delay/keepalive.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::error::{LlmError, Result};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes>> + Send>>;

/// A single part of a multipart form body.
pub enum FormPart {
    Text { name: String, value: String },
    File {
        name: String,
        filename: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, path: &str, headers: &[(String, String)], body: Value) -> Result<Value>;

    async fn get_json(&self, path: &str, headers: &[(String, String)]) -> Result<Value>;

    async fn post_form(&self, path: &str, headers: &[(String, String)], parts: Vec<FormPart>) -> Result<Value>;

    async fn get_bytes(&self, path: &str, headers: &[(String, String)]) -> Result<Vec<u8>>;

    async fn delete(&self, path: &str, headers: &[(String, String)]) -> Result<()>;

    /// Returns a finite stream of raw body chunks for an SSE response.
    /// Closes on server EOF or when the returned stream is dropped
    /// (cancellation propagates via `reqwest`'s underlying connection drop).
    async fn post_sse(&self, path: &str, headers: &[(String, String)], body: Value) -> Result<ByteStream>;

    /// POST-JSON whose response body is raw bytes rather than JSON (a TTS
    /// endpoint returns `audio/*`, not JSON).
    async fn post_json_bytes(&self, path: &str, headers: &[(String, String)], body: Value) -> Result<Vec<u8>>;
}

pub(crate) fn default_http_client_builder() -> reqwest::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(reqwest::header::CONNECTION, HeaderValue::from_static("keep-alive"));

    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        // Hyper's pool only exposes max-idle-per-host and an idle timeout, no
        // per-connection TTL; a short idle timeout keeps us honest about DNS
        // changes even while traffic is steady.
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
}

const DEFAULT_JSON_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default `reqwest`-backed transport. One instance per provider handle
/// unless the caller shares one explicitly.
///
/// Carries two timeouts rather than one: JSON calls and streaming calls
/// want different per-call defaults (30 s vs. 5 min), both still composed
/// from `config.timeout` when the caller sets one explicitly (see
/// `with_timeout`).
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    json_timeout: Duration,
    stream_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    /// `config_timeout` is `Config::timeout`: `None` falls back to the
    /// per-call-kind defaults (30 s JSON / 5 min stream); `Some` overrides
    /// both, since an explicit caller choice should win over either
    /// default.
    pub fn with_timeout(base_url: impl Into<String>, config_timeout: Option<Duration>) -> Result<Self> {
        let json_timeout = config_timeout.unwrap_or(DEFAULT_JSON_TIMEOUT);
        let stream_timeout = config_timeout.unwrap_or(DEFAULT_STREAM_TIMEOUT);

        // The client-level timeout is the longer of the two; each request
        // explicitly overrides it with the timeout appropriate to its kind.
        let client = default_http_client_builder()
            .timeout(json_timeout.max(stream_timeout))
            .build()
            .map_err(|e| LlmError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(ReqwestTransport {
            client,
            base_url: base_url.into(),
            json_timeout,
            stream_timeout,
        })
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, json_timeout: Duration, stream_timeout: Duration) -> Self {
        ReqwestTransport {
            client,
            base_url: base_url.into(),
            json_timeout,
            stream_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        }
    }

    fn build_headers(pairs: &[(String, String)]) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| LlmError::InvalidRequest(format!("invalid header name '{k}': {e}")))?;
            let value =
                HeaderValue::from_str(v).map_err(|e| LlmError::InvalidRequest(format!("invalid header value for '{k}': {e}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    async fn map_error_response(response: reqwest::Response) -> LlmError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(LlmError::parse_retry_after);
        let body = response.text().await.unwrap_or_default();
        LlmError::from_status(status, &body, retry_after)
    }

    fn map_transport_error(err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Http("request timed out".to_string())
        } else if err.is_connect() {
            LlmError::Http(format!("connection failed: {err}"))
        } else {
            LlmError::Http(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(&self, path: &str, headers: &[(String, String)], body: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.url(path))
            .headers(Self::build_headers(headers)?)
            .json(&body)
            .timeout(self.json_timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::JsonParse(e.to_string()))
    }

    async fn get_json(&self, path: &str, headers: &[(String, String)]) -> Result<Value> {
        let response = self
            .client
            .get(self.url(path))
            .headers(Self::build_headers(headers)?)
            .timeout(self.json_timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::JsonParse(e.to_string()))
    }

    async fn post_form(&self, path: &str, headers: &[(String, String)], parts: Vec<FormPart>) -> Result<Value> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    mime,
                    bytes,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes)
                        .file_name(filename)
                        .mime_str(&mime)
                        .map_err(|e| LlmError::InvalidRequest(format!("invalid mime type '{mime}': {e}")))?;
                    form.part(name, part)
                }
            };
        }

        let response = self
            .client
            .post(self.url(path))
            .headers(Self::build_headers(headers)?)
            .multipart(form)
            .timeout(self.json_timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::JsonParse(e.to_string()))
    }

    async fn get_bytes(&self, path: &str, headers: &[(String, String)]) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(path))
            .headers(Self::build_headers(headers)?)
            .timeout(self.json_timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| LlmError::Http(e.to_string()))
    }

    async fn delete(&self, path: &str, headers: &[(String, String)]) -> Result<()> {
        let response = self
            .client
            .delete(self.url(path))
            .headers(Self::build_headers(headers)?)
            .timeout(self.json_timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }
        Ok(())
    }

    async fn post_sse(&self, path: &str, headers: &[(String, String)], body: Value) -> Result<ByteStream> {
        use futures::StreamExt;

        let response = self
            .client
            .post(self.url(path))
            .headers(Self::build_headers(headers)?)
            .json(&body)
            .timeout(self.stream_timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Self::map_transport_error));

        Ok(Box::pin(stream))
    }

    async fn post_json_bytes(&self, path: &str, headers: &[(String, String)], body: Value) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.url(path))
            .headers(Self::build_headers(headers)?)
            .json(&body)
            .timeout(self.json_timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| LlmError::Http(e.to_string()))
    }
}
