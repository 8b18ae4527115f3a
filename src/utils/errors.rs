use serde::Deserialize;
use thiserror::Error;

/// Discriminant of [`TaxChatError`], used to pick user-facing wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RequestFailed,
    NetworkUnavailable,
    RateLimited,
    Unauthorized,
    PermissionDenied,
    NotFound,
    ServerFault,
    UploadRejected,
    UploadCancelled,
    InvalidResponse,
    Io,
    Config,
}

/// Main error type for TaxChat
#[derive(Error, Debug)]
pub enum TaxChatError {
    #[error("Request failed (status {status:?}): {}", .message.as_deref().unwrap_or("no details"))]
    RequestFailed {
        status: Option<u16>,
        message: Option<String>,
    },

    #[error("Network unavailable: {detail}")]
    NetworkUnavailable { detail: String, timed_out: bool },

    #[error("Rate limited by the API")]
    RateLimited,

    #[error("Authentication required")]
    Unauthorized(Option<String>),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Resource not found")]
    NotFound,

    #[error("Server fault (status {0})")]
    ServerFault(u16),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Upload cancelled")]
    UploadCancelled,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TaxChatError>;

/// Error bodies the API sends back, e.g. `{"message": "..."}` or `{"error": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl TaxChatError {
    /// Map a non-2xx status and its raw body onto the taxonomy
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::Unauthorized(body_message(body)),
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            s if s >= 500 => Self::ServerFault(s),
            s => Self::RequestFailed {
                status: Some(s),
                message: body_message(body),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestFailed { .. } => ErrorKind::RequestFailed,
            Self::NetworkUnavailable { .. } => ErrorKind::NetworkUnavailable,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::NotFound => ErrorKind::NotFound,
            Self::ServerFault(_) => ErrorKind::ServerFault,
            Self::UploadRejected(_) => ErrorKind::UploadRejected,
            Self::UploadCancelled => ErrorKind::UploadCancelled,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Server-supplied message, kept only where it is safe to show
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::RequestFailed { message, .. } | Self::Unauthorized(message) => message.as_deref(),
            _ => None,
        }
    }

    /// HTTP status behind the error, when one is known
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => *status,
            Self::Unauthorized(_) => Some(401),
            Self::PermissionDenied => Some(403),
            Self::NotFound => Some(404),
            Self::RateLimited => Some(429),
            Self::ServerFault(status) => Some(*status),
            _ => None,
        }
    }
}

/// An error already rendered for display, with the typed cause kept for callers
#[derive(Error, Debug)]
#[error("{message}")]
pub struct UserFacingError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: TaxChatError,
}

impl UserFacingError {
    pub fn new(message: impl Into<String>, source: TaxChatError) -> Self {
        Self {
            kind: source.kind(),
            message: message.into(),
            source,
        }
    }
}

fn body_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

impl From<reqwest::Error> for TaxChatError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), "");
        }
        if err.is_timeout() {
            return Self::NetworkUnavailable {
                detail: err.to_string(),
                timed_out: true,
            };
        }
        if err.is_connect() || err.is_request() || err.is_body() {
            return Self::NetworkUnavailable {
                detail: err.to_string(),
                timed_out: false,
            };
        }
        if err.is_decode() {
            return Self::InvalidResponse(err.to_string());
        }
        Self::RequestFailed {
            status: None,
            message: None,
        }
    }
}

impl From<serde_json::Error> for TaxChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
