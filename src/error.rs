//! Normalized error taxonomy.
//!
//! Every failure that can occur while talking to a vendor, building a
//! request, or parsing a response surfaces as one of these variants. HTTP
//! status codes are mapped at the transport boundary; vendor error payloads
//! (Anthropic's `error.type`, for instance) override the status-code mapping
//! when present, since they're more specific.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// The closed error sum for this crate.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider error: {0}")]
    Provider(String),

    /// The vendor returned a body that didn't match the expected shape.
    /// Carries the raw text so callers can log or replay it.
    #[error("Unexpected response format: {raw}")]
    ResponseFormat { raw: String },

    #[error("{0}")]
    Generic(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(String),

    #[error("Tool configuration error: {0:?}")]
    ToolConfig(Vec<String>),

    #[error("Rate limit exceeded")]
    RateLimit {
        retry_after: Option<std::time::Duration>,
        remaining_requests: Option<u32>,
    },

    #[error("Quota exceeded{}", quota_type.as_deref().map(|t| format!(" ({t})")).unwrap_or_default())]
    QuotaExceeded { quota_type: Option<String> },

    #[error("Model '{model}' is not available{}", available.as_ref().map(|a| format!(" (available: {})", a.join(", "))).unwrap_or_default())]
    ModelNotAvailable { model: String, available: Option<Vec<String>> },

    #[error("Content filtered{}", filter_type.as_deref().map(|t| format!(" ({t})")).unwrap_or_default())]
    ContentFilter { filter_type: Option<String> },

    #[error("Server error{}", status_code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Server { status_code: Option<u16> },

    /// Request or stream was cancelled by the caller.
    #[error("Request cancelled")]
    Cancelled,

    /// Internal error that shouldn't normally surface; carries context for
    /// logs but is not vendor/caller specific.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Map an HTTP status code (plus optional vendor-supplied detail) to an
    /// `LlmError`.
    pub fn from_status(status: u16, body: &str, retry_after: Option<std::time::Duration>) -> Self {
        match status {
            400 => LlmError::InvalidRequest(body.to_string()),
            401 => LlmError::Auth(body.to_string()),
            403 => LlmError::Auth(format!("Forbidden: {body}")),
            404 => {
                if body_names_model(body) {
                    LlmError::ModelNotAvailable {
                        model: extract_model_hint(body).unwrap_or_default(),
                        available: None,
                    }
                } else {
                    LlmError::NotFound(body.to_string())
                }
            }
            422 => LlmError::InvalidRequest(format!("Validation: {body}")),
            429 => LlmError::RateLimit {
                retry_after,
                remaining_requests: None,
            },
            500 | 502 | 503 | 504 => LlmError::Server {
                status_code: Some(status),
            },
            400..=499 => LlmError::Http(format!("HTTP {status}: {body}")),
            500..=599 => LlmError::Server {
                status_code: Some(status),
            },
            other => LlmError::Http(format!("HTTP {other}: {body}")),
        }
    }

    /// Override the status-code mapping with a vendor-specific error type,
    /// e.g. Anthropic's `error.type` field.
    pub fn from_anthropic_type(error_type: &str, message: &str) -> Self {
        match error_type {
            "authentication_error" => LlmError::Auth(message.to_string()),
            "permission_error" => LlmError::Auth(format!("Forbidden: {message}")),
            "invalid_request_error" => LlmError::InvalidRequest(message.to_string()),
            "not_found_error" => LlmError::NotFound(message.to_string()),
            "rate_limit_error" => LlmError::RateLimit {
                retry_after: None,
                remaining_requests: None,
            },
            "api_error" | "overloaded_error" => LlmError::Server { status_code: None },
            other => {
                log::warn!("Unrecognized Anthropic error type '{other}': {message}");
                LlmError::Provider(message.to_string())
            }
        }
    }

    /// Parse `Retry-After` as either a plain integer number of seconds or an
    /// HTTP-date.
    pub fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        if let Ok(secs) = value.trim().parse::<u64>() {
            return Some(std::time::Duration::from_secs(secs));
        }

        httpdate::parse_http_date(value.trim())
            .ok()
            .and_then(|time| time.duration_since(std::time::SystemTime::now()).ok())
    }
}

fn body_names_model(body: &str) -> bool {
    body.to_ascii_lowercase().contains("model")
}

fn extract_model_hint(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("model").and_then(|m| m.as_str()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_well_known_statuses() {
        assert!(matches!(LlmError::from_status(401, "", None), LlmError::Auth(_)));
        assert!(matches!(LlmError::from_status(400, "", None), LlmError::InvalidRequest(_)));
        assert!(matches!(
            LlmError::from_status(429, "", Some(std::time::Duration::from_secs(7))),
            LlmError::RateLimit {
                retry_after: Some(d),
                ..
            } if d.as_secs() == 7
        ));
        assert!(matches!(
            LlmError::from_status(503, "", None),
            LlmError::Server { status_code: Some(503) }
        ));
    }

    #[test]
    fn anthropic_error_type_overrides_status_mapping() {
        assert!(matches!(
            LlmError::from_anthropic_type("overloaded_error", "busy"),
            LlmError::Server { .. }
        ));
    }

    #[test]
    fn retry_after_parses_plain_seconds() {
        let d = LlmError::parse_retry_after("7").unwrap();
        assert_eq!(d.as_secs(), 7);
    }
}
