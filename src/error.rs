use reqwest::StatusCode;
use serde_json::Value;

/// Failure taxonomy surfaced by every client operation.
///
/// Variants carry the HTTP status (when a response was received) and a
/// human-readable message so callers can map them to user guidance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JiraError {
    #[error("jira rejected the credentials (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },
    #[error("jira denied access (HTTP {status}): {message}")]
    Permission { status: u16, message: String },
    #[error("jira resource not found (HTTP {status}): {message}")]
    NotFound { status: u16, message: String },
    #[error("invalid request: {message}")]
    Validation { status: Option<u16>, message: String },
    #[error("jira server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("jira returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("jira request failed: {message}")]
    Network { message: String },
    #[error("unexpected jira response (HTTP {status}): {message}")]
    UnexpectedResponse { status: u16, message: String },
}

impl JiraError {
    /// Classifies a non-2xx response.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let code = status.as_u16();
        match code {
            400 => JiraError::Validation {
                status: Some(code),
                message,
            },
            401 => JiraError::Authentication {
                status: code,
                message,
            },
            403 => JiraError::Permission {
                status: code,
                message,
            },
            404 => JiraError::NotFound {
                status: code,
                message,
            },
            _ if status.is_server_error() => JiraError::Server {
                status: code,
                message,
            },
            _ => JiraError::Http {
                status: code,
                message,
            },
        }
    }

    /// Client-side validation failure; no request was sent.
    pub fn invalid(message: impl Into<String>) -> Self {
        JiraError::Validation {
            status: None,
            message: message.into(),
        }
    }

    pub fn unexpected(status: u16, message: impl Into<String>) -> Self {
        JiraError::UnexpectedResponse {
            status,
            message: message.into(),
        }
    }

    /// HTTP status attached to the failure, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            JiraError::Authentication { status, .. }
            | JiraError::Permission { status, .. }
            | JiraError::NotFound { status, .. }
            | JiraError::Server { status, .. }
            | JiraError::Http { status, .. }
            | JiraError::UnexpectedResponse { status, .. } => Some(*status),
            JiraError::Validation { status, .. } => *status,
            JiraError::Network { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            JiraError::Authentication { message, .. }
            | JiraError::Permission { message, .. }
            | JiraError::NotFound { message, .. }
            | JiraError::Validation { message, .. }
            | JiraError::Server { message, .. }
            | JiraError::Http { message, .. }
            | JiraError::Network { message }
            | JiraError::UnexpectedResponse { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for JiraError {
    fn from(err: reqwest::Error) -> Self {
        JiraError::Network {
            message: err.to_string(),
        }
    }
}

/// Builds the message for a failed response, preferring the joined
/// `errorMessages`, then the serialized `errors` map, then the status line.
pub fn error_message_from_body(status: StatusCode, body: Option<&Value>) -> String {
    if let Some(body) = body {
        let joined = body
            .get("errorMessages")
            .and_then(Value::as_array)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        if !joined.is_empty() {
            return joined;
        }

        if let Some(errors) = body.get("errors").and_then(Value::as_object) {
            if !errors.is_empty() {
                return Value::Object(errors.clone()).to_string();
            }
        }
    }

    status_line(status)
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
