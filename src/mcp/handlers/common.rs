use crate::core::error::CrawlError;
use crate::core::types::ErrorResponse;
use crate::mcp::{McpCallResponse, McpContent};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::Value;

pub type HandlerResult = Result<Json<McpCallResponse>, (StatusCode, Json<ErrorResponse>)>;

pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a core error onto the HTTP boundary: bad input is the caller's
/// fault, everything else is ours.
pub fn core_error(e: CrawlError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        CrawlError::BadInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub fn require_str<'a>(
    arguments: &'a Value,
    key: &str,
) -> Result<&'a str, (StatusCode, Json<ErrorResponse>)> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| bad_request(format!("Missing required parameter: {}", key)))
}

pub fn opt_str(arguments: &Value, key: &str) -> Option<String> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
}

pub fn opt_usize(arguments: &Value, key: &str) -> Option<usize> {
    arguments.get(key).and_then(|v| v.as_u64()).map(|n| n as usize)
}

pub fn opt_f64(arguments: &Value, key: &str) -> Option<f64> {
    arguments.get(key).and_then(|v| v.as_f64())
}

pub fn opt_bool(arguments: &Value, key: &str) -> Option<bool> {
    arguments.get(key).and_then(|v| v.as_bool())
}

/// Wrap a serializable payload as a one-chunk JSON tool response.
pub fn json_response<T: serde::Serialize>(payload: &T) -> Json<McpCallResponse> {
    let text = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|e| format!(r#"{{"error": "failed to serialize response: {}"}}"#, e));
    Json(McpCallResponse {
        content: vec![McpContent {
            content_type: "text".to_string(),
            text,
        }],
        is_error: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_str_rejects_missing_and_blank() {
        let args = json!({"url": "", "ok": "value"});
        assert!(require_str(&args, "url").is_err());
        assert!(require_str(&args, "absent").is_err());
        assert_eq!(require_str(&args, "ok").unwrap(), "value");
    }

    #[test]
    fn optional_accessors_tolerate_wrong_types() {
        let args = json!({"n": "not-a-number", "b": 1});
        assert_eq!(opt_usize(&args, "n"), None);
        assert_eq!(opt_bool(&args, "b"), None);
    }
}
