use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {}", .0.as_deref().unwrap_or("token may be expired"))]
    Unauthorized(Option<String>),

    #[error("Access denied: {}", .0.as_deref().unwrap_or("forbidden"))]
    AccessDenied(Option<String>),

    #[error("Resource not found: {}", .0.as_deref().unwrap_or("no details"))]
    NotFound(Option<String>),

    #[error("Rate limited - please wait before retrying")]
    RateLimited(Option<String>),

    #[error("Bad request: {}", .0.as_deref().unwrap_or("no details"))]
    BadRequest(Option<String>),

    /// `body` is the truncated raw response, kept for logs only
    #[error("Server error: {}", server_detail(.message, .body))]
    ServerError { message: Option<String>, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

fn server_detail<'a>(message: &'a Option<String>, body: &'a str) -> &'a str {
    match message.as_deref() {
        Some(message) => message,
        None if !body.is_empty() => body,
        None => "no details",
    }
}

/// Error body shape produced by the backend: `{ statusCode, message, error }`.
/// Validation failures send `message` as a list.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<ErrorMessage>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human-readable message out of a JSON error body, if there is one.
    fn extract_message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        let message = match parsed.message? {
            ErrorMessage::One(m) => m,
            ErrorMessage::Many(list) => list.join(", "),
        };
        let message = message.trim();
        (!message.is_empty()).then(|| message.to_string())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited(message),
            500..=599 => ApiError::ServerError {
                message,
                body: Self::truncate_body(body),
            },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, Self::truncate_body(body))),
        }
    }

    /// Message supplied by the server, when it sent one.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(m)
            | ApiError::AccessDenied(m)
            | ApiError::NotFound(m)
            | ApiError::RateLimited(m)
            | ApiError::BadRequest(m)
            | ApiError::ServerError { message: m, .. } => m.as_deref(),
            ApiError::NetworkError(_) | ApiError::InvalidResponse(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_extracts_message() {
        let body = r#"{"statusCode":401,"message":"Invalid login credentials","error":"Unauthorized"}"#;
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, body);
        assert!(err.is_unauthorized());
        assert_eq!(err.upstream_message(), Some("Invalid login credentials"));
    }

    #[test]
    fn test_from_status_joins_validation_messages() {
        let body = r#"{"statusCode":400,"message":["email must be an email","password too short"]}"#;
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.upstream_message(), Some("email must be an email, password too short"));
    }

    #[test]
    fn test_from_status_without_json_body() {
        let err = ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, ApiError::RateLimited(None)));

        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.upstream_message(), None);
    }

    #[test]
    fn test_server_error_body_is_not_a_message() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, &body);
        assert_eq!(err.upstream_message(), None);
        let shown = err.to_string();
        assert!(shown.contains("truncated"));
        assert!(shown.len() < body.len() + 60);

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "<html><body>502 Bad Gateway</body></html>");
        assert_eq!(err.upstream_message(), None);
        assert!(err.to_string().contains("502 Bad Gateway"));
    }

    #[test]
    fn test_server_error_prefers_json_message() {
        let body = r#"{"statusCode":503,"message":"Auth provider unavailable"}"#;
        let err = ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, body);
        assert_eq!(err.upstream_message(), Some("Auth provider unavailable"));
        assert_eq!(err.to_string(), "Server error: Auth provider unavailable");
    }

    #[test]
    fn test_unexpected_status_is_invalid_response() {
        let err = ApiError::from_status(StatusCode::IM_A_TEAPOT, "{}");
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert_eq!(err.upstream_message(), None);
    }
}
