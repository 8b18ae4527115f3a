use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A titled thread of messages between the user and the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Assigned by the API, never by the client
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author of a message, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "You"),
            Self::Assistant => write!(f, "Assistant"),
        }
    }
}

/// Client-side tag for an optimistic message that has not been confirmed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

static NEXT_CORRELATION: AtomicU64 = AtomicU64::new(1);

impl CorrelationId {
    /// Allocate a process-unique correlation id
    pub fn next() -> Self {
        Self(NEXT_CORRELATION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temp-{}", self.0)
    }
}

/// Identity of a message in the local list
///
/// Pending ids exist only between an optimistic append and the server's answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    Pending(CorrelationId),
    Confirmed(String),
}

impl MessageId {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn confirmed(&self) -> Option<&str> {
        match self {
            Self::Confirmed(id) => Some(id),
            Self::Pending(_) => None,
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(tag) => write!(f, "{}", tag),
            Self::Confirmed(id) => write!(f, "{}", id),
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: String,
    pub role: Role,
    /// Immutable after creation
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub attachments: Vec<String>,
}

impl Message {
    /// Build the optimistic placeholder for a user message about to be sent
    pub fn pending(conversation_id: &str, content: &str, attachments: Vec<String>) -> Self {
        Self {
            id: MessageId::Pending(CorrelationId::next()),
            conversation_id: conversation_id.to_string(),
            role: Role::User,
            content: content.to_string(),
            created_at: Utc::now(),
            attachments,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }

    pub fn correlation(&self) -> Option<CorrelationId> {
        match self.id {
            MessageId::Pending(tag) => Some(tag),
            MessageId::Confirmed(_) => None,
        }
    }
}

/// Server answer to a send: the persisted user turn and the generated reply
#[derive(Debug, Clone, PartialEq)]
pub struct MessageExchange {
    pub user_message: Message,
    pub assistant_message: Option<Message>,
}

/// Outgoing body of `POST /conversations/{id}/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
}

impl SendMessageRequest {
    pub fn new(content: impl Into<String>, file_ref: Option<String>) -> Self {
        Self {
            content: content.into(),
            attachments: file_ref.map(|url| vec![url]),
        }
    }
}

/// Authenticated account as returned by `/auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Durable reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub url: String,
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
}
