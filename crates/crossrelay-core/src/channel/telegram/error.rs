use reqwest::StatusCode;
use thiserror::Error;

use crossrelay_traits::DeliveryError;

/// Raw failure from a Bot API call.
#[derive(Debug, Error)]
#[error("{}", describe(.status, .error_code, .body))]
pub(super) struct TelegramApiError {
    pub(super) status: Option<StatusCode>,
    pub(super) error_code: Option<i64>,
    pub(super) retry_after_secs: Option<u64>,
    pub(super) body: String,
}

impl TelegramApiError {
    pub(super) fn from_reqwest(err: reqwest::Error) -> Self {
        let body = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        Self {
            status: err.status(),
            error_code: None,
            retry_after_secs: None,
            body,
        }
    }

    /// Build from an HTTP status and the (possibly non-JSON) body.
    pub(super) fn from_response(status: StatusCode, data: &serde_json::Value, raw: &str) -> Self {
        Self {
            status: Some(status),
            error_code: telegram_api_error_code(data),
            retry_after_secs: telegram_api_error_retry_after_secs(data),
            body: telegram_api_error_description(data, raw).to_string(),
        }
    }

    pub(super) fn is_rate_limited(&self) -> bool {
        self.status == Some(StatusCode::TOO_MANY_REQUESTS) || self.error_code == Some(429)
    }

    fn is_retryable(&self) -> bool {
        let retryable_status = match self.status {
            Some(status) => status == StatusCode::REQUEST_TIMEOUT || status.is_server_error(),
            None => true,
        };
        retryable_status || self.error_code.is_some_and(|code| code >= 500)
    }

    /// Edits that change nothing are reported as errors by the Bot API.
    pub(super) fn is_not_modified(&self) -> bool {
        self.body
            .to_ascii_lowercase()
            .contains("message is not modified")
    }

    pub(super) fn into_delivery_error(self) -> DeliveryError {
        if self.is_rate_limited() {
            return DeliveryError::RateLimited {
                retry_after_secs: self.retry_after_secs.unwrap_or(1),
            };
        }
        let message = self.to_string();
        if self.is_retryable() {
            DeliveryError::Transient(message)
        } else {
            DeliveryError::Permanent(message)
        }
    }
}

fn describe(status: &Option<StatusCode>, error_code: &Option<i64>, body: &str) -> String {
    match (status, error_code) {
        (Some(status), Some(code)) => format!("status={status}, error_code={code}, body={body}"),
        (Some(status), None) => format!("status={status}, body={body}"),
        (None, Some(code)) => format!("error_code={code}, body={body}"),
        (None, None) => body.to_string(),
    }
}

fn telegram_api_error_retry_after_secs(data: &serde_json::Value) -> Option<u64> {
    data.get("parameters")
        .and_then(|v| v.get("retry_after"))
        .and_then(serde_json::Value::as_u64)
}

fn telegram_api_error_code(data: &serde_json::Value) -> Option<i64> {
    data.get("error_code").and_then(serde_json::Value::as_i64)
}

fn telegram_api_error_description<'a>(data: &'a serde_json::Value, fallback: &'a str) -> &'a str {
    data.get("description")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_error(status: u16, data: serde_json::Value) -> TelegramApiError {
        TelegramApiError::from_response(StatusCode::from_u16(status).unwrap(), &data, "raw")
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let err = api_error(
            429,
            json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 7",
                "parameters": { "retry_after": 7 }
            }),
        );
        assert_eq!(
            err.into_delivery_error(),
            DeliveryError::RateLimited {
                retry_after_secs: 7
            }
        );
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = api_error(502, json!({ "ok": false, "description": "Bad Gateway" }));
        assert!(matches!(
            err.into_delivery_error(),
            DeliveryError::Transient(_)
        ));
    }

    #[test]
    fn test_client_errors_are_permanent() {
        let err = api_error(
            403,
            json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was kicked from the supergroup chat"
            }),
        );
        let delivery = err.into_delivery_error();
        assert!(delivery.is_permanent());
        assert!(delivery.to_string().contains("bot was kicked"));
    }

    #[test]
    fn test_description_falls_back_to_raw_body() {
        let err = api_error(400, serde_json::Value::Null);
        assert_eq!(err.body, "raw");
    }

    #[test]
    fn test_display_includes_status_and_code() {
        let err = api_error(
            400,
            json!({ "ok": false, "error_code": 400, "description": "Bad Request: chat not found" }),
        );
        assert_eq!(
            err.to_string(),
            "status=400 Bad Request, error_code=400, body=Bad Request: chat not found"
        );

        let bare = TelegramApiError {
            status: None,
            error_code: None,
            retry_after_secs: None,
            body: "connection refused".to_string(),
        };
        assert_eq!(bare.to_string(), "connection refused");
        let _: &dyn std::error::Error = &bare;
    }

    #[test]
    fn test_not_modified_detection() {
        let err = api_error(
            400,
            json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
            }),
        );
        assert!(err.is_not_modified());
    }
}
