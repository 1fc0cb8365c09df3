//! Error taxonomy for graph API calls.
//!
//! Every [`GraphError`] carries an [`ErrorContext`] naming the operation, the
//! identifier it targeted and the HTTP status (when a response was received).

use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;

/// Client operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchObject,
    FetchObjects,
    FetchConnection,
    PublishPost,
    PublishComment,
    PublishLike,
    DeleteObject,
    Search,
    NextPage,
}

impl Operation {
    /// Writes mutate remote state and are never replayed after the server saw them
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::PublishPost
                | Operation::PublishComment
                | Operation::PublishLike
                | Operation::DeleteObject
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchObject => "fetch_object",
            Operation::FetchObjects => "fetch_objects",
            Operation::FetchConnection => "fetch_connection",
            Operation::PublishPost => "publish_post",
            Operation::PublishComment => "publish_comment",
            Operation::PublishLike => "publish_like",
            Operation::DeleteObject => "delete_object",
            Operation::Search => "search",
            Operation::NextPage => "next_page",
        };
        f.write_str(name)
    }
}

/// Where an error happened: operation, target identifier, HTTP status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub operation: Operation,
    pub target: String,
    pub status: Option<u16>,
}

impl ErrorContext {
    pub fn new(operation: Operation, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status.as_u16());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.operation, self.target)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

/// Broad failure class, used for retry decisions and test assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    NotFound,
    Validation,
    Transient,
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("authorization failed for {context}: {message}")]
    Auth { context: ErrorContext, message: String },

    #[error("not found: {context}: {message}")]
    NotFound { context: ErrorContext, message: String },

    #[error("invalid request for {context}: {message}")]
    Validation { context: ErrorContext, message: String },

    #[error("transient failure for {context} after {attempts} attempt(s): {message}")]
    Transient {
        context: ErrorContext,
        attempts: u32,
        message: String,
    },

    #[error("unexpected response for {context}: {message}")]
    Unexpected { context: ErrorContext, message: String },
}

impl GraphError {
    pub(crate) fn of_kind(kind: ErrorKind, context: ErrorContext, message: String) -> Self {
        match kind {
            ErrorKind::Auth => GraphError::Auth { context, message },
            ErrorKind::NotFound => GraphError::NotFound { context, message },
            ErrorKind::Validation => GraphError::Validation { context, message },
            ErrorKind::Transient => GraphError::Transient {
                context,
                attempts: 1,
                message,
            },
            ErrorKind::Unexpected => GraphError::Unexpected { context, message },
        }
    }

    pub(crate) fn validation(operation: Operation, target: &str, message: impl Into<String>) -> Self {
        GraphError::Validation {
            context: ErrorContext::new(operation, target),
            message: message.into(),
        }
    }

    pub(crate) fn missing_token(operation: Operation, target: &str) -> Self {
        GraphError::Auth {
            context: ErrorContext::new(operation, target),
            message: "no access token configured; writes require a credential".to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Auth { .. } => ErrorKind::Auth,
            GraphError::NotFound { .. } => ErrorKind::NotFound,
            GraphError::Validation { .. } => ErrorKind::Validation,
            GraphError::Transient { .. } => ErrorKind::Transient,
            GraphError::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            GraphError::Auth { context, .. }
            | GraphError::NotFound { context, .. }
            | GraphError::Validation { context, .. }
            | GraphError::Transient { context, .. }
            | GraphError::Unexpected { context, .. } => context,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// `{"error": {...}}` envelope returned by the graph API on failure
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_subcode: Option<i64>,
}

impl ApiErrorBody {
    /// Parse an error body, tolerating non-JSON responses
    pub(crate) fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error)
    }

    fn describe(&self) -> String {
        let message = self.message.as_deref().unwrap_or("no message");
        match (&self.error_type, self.code) {
            (Some(kind), Some(code)) => format!("{} (#{}): {}", kind, code, message),
            (Some(kind), None) => format!("{}: {}", kind, message),
            (None, Some(code)) => format!("(#{}) {}", code, message),
            (None, None) => message.to_string(),
        }
    }
}

/// Classify a non-success response into an error kind plus a diagnostic message
pub(crate) fn classify(status: StatusCode, body: &str) -> (ErrorKind, String) {
    let api_error = ApiErrorBody::parse(body);
    let message = match &api_error {
        Some(err) => err.describe(),
        None if body.trim().is_empty() => status.to_string(),
        None => truncate(body, 256),
    };

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Auth,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::Transient,
        s if s.is_server_error() => ErrorKind::Transient,
        _ => api_error
            .as_ref()
            .map(kind_from_api_error)
            .unwrap_or(ErrorKind::Validation),
    };

    (kind, message)
}

fn kind_from_api_error(err: &ApiErrorBody) -> ErrorKind {
    let missing = err
        .message
        .as_deref()
        .map(|m| m.contains("does not exist") || m.contains("Unknown path components"))
        .unwrap_or(false);

    match err.code {
        Some(803) => ErrorKind::NotFound,
        Some(100) | Some(2500) if missing => ErrorKind::NotFound,
        Some(10) | Some(102) | Some(190) | Some(2500) => ErrorKind::Auth,
        Some(code) if (200..300).contains(&code) => ErrorKind::Auth,
        Some(1) | Some(2) | Some(4) | Some(17) | Some(341) => ErrorKind::Transient,
        Some(_) => ErrorKind::Validation,
        None if missing => ErrorKind::NotFound,
        None if err.error_type.as_deref() == Some("OAuthException") => ErrorKind::Auth,
        None => ErrorKind::Validation,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
