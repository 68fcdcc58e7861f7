//! Provider error taxonomy and redacted failure dumps.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

/// Classified provider failure.
///
/// Classification drives caller-facing diagnostics only; every variant
/// aborts the run the same way (`stop_reason = error`).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error("rate limited: {message}")]
    RateLimit { message: String },

    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("malformed provider response: {message}")]
    InvalidResponse { message: String },
}

impl ApiError {
    /// Classify an HTTP-level failure by status code.
    pub fn classify(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Authentication { message },
            429 => Self::RateLimit { message },
            _ => Self::Provider { status, message },
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

/// A request/response pair captured at failure time for offline
/// debugging. Secrets are redacted at construction, before the dump can
/// be logged or serialized.
#[derive(Debug, Clone, Serialize)]
pub struct FailureDump {
    pub provider: String,
    pub request: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl FailureDump {
    pub fn new(provider: impl Into<String>, request: Value, response: Option<Value>) -> Self {
        Self {
            provider: provider.into(),
            request: redact(request),
            response: response.map(redact),
        }
    }
}

const REDACTED: &str = "[redacted]";

/// Keys whose values are never allowed into a dump.
const SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "api-key",
    "x-api-key",
    "authorization",
    "access_token",
    "secret",
];

// sk-... style key material embedded in string values.
#[allow(clippy::unwrap_used)]
static KEY_MATERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bsk-[A-Za-z0-9_-]{8,}").unwrap());

/// Strip credential-shaped content from an arbitrary JSON value.
fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| {
                    let lowered = key.to_ascii_lowercase();
                    if SENSITIVE_KEYS.contains(&lowered.as_str()) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        Value::String(text) => {
            Value::String(KEY_MATERIAL.replace_all(&text, REDACTED).into_owned())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classify_by_status() {
        assert!(matches!(
            ApiError::classify(401, "bad key"),
            ApiError::Authentication { .. }
        ));
        assert!(matches!(
            ApiError::classify(429, "slow down"),
            ApiError::RateLimit { .. }
        ));
        assert!(matches!(
            ApiError::classify(500, "oops"),
            ApiError::Provider { status: 500, .. }
        ));
    }

    #[test]
    fn dump_redacts_sensitive_keys_and_key_material() {
        let dump = FailureDump::new(
            "anthropic",
            serde_json::json!({
                "headers": {"x-api-key": "sk-ant-abcdefgh12345678", "accept": "application/json"},
                "body": {"system": "you hold sk-proj-abcdefgh12345678 carefully"}
            }),
            None,
        );
        assert_eq!(dump.request["headers"]["x-api-key"], "[redacted]");
        assert_eq!(dump.request["headers"]["accept"], "application/json");
        let body = dump.request["body"]["system"].as_str().unwrap();
        assert!(!body.contains("sk-proj"));
        assert!(body.contains("[redacted]"));
    }
}
