//! Response shapes of the REST API and their conversion into local models

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{Message, MessageExchange, MessageId, Role, User};
use crate::utils::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

impl From<ApiMessage> for Message {
    fn from(dto: ApiMessage) -> Self {
        // Attachments come back either as bare URLs or as upload records
        let attachments = dto
            .attachments
            .into_iter()
            .filter_map(|a| match a {
                Value::String(url) => Some(url),
                Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect();

        Self {
            id: MessageId::Confirmed(dto.id),
            conversation_id: dto.conversation_id,
            role: dto.role,
            content: dto.content,
            created_at: dto.created_at.or(dto.timestamp).unwrap_or_else(Utc::now),
            attachments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeDto {
    user_message: ApiMessage,
    #[serde(default)]
    assistant_message: Option<ApiMessage>,
}

/// Decode the body of a send; older servers return the bare user message
pub fn parse_exchange(data: Value) -> Result<MessageExchange> {
    let (user, assistant) = if data.get("userMessage").is_some() {
        let dto: ExchangeDto = serde_json::from_value(data)?;
        (dto.user_message, dto.assistant_message)
    } else {
        (serde_json::from_value::<ApiMessage>(data)?, None)
    };

    Ok(MessageExchange {
        user_message: user.into(),
        assistant_message: assistant.map(Message::from),
    })
}

pub fn parse_messages(data: Value) -> Result<Vec<Message>> {
    let dtos: Vec<ApiMessage> = serde_json::from_value(data)?;
    Ok(dtos.into_iter().map(Message::from).collect())
}

/// Tokens and account handed out by login and signup
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_json(id: &str, role: &str, content: &str) -> Value {
        json!({
            "id": id,
            "conversationId": "c1",
            "role": role,
            "content": content,
            "timestamp": "2025-01-05T10:00:00Z",
            "createdAt": "2025-01-05T10:00:01Z"
        })
    }

    #[test]
    fn test_exchange_with_both_messages() {
        let exchange = parse_exchange(json!({
            "userMessage": message_json("m1", "USER", "What is PAYE?"),
            "assistantMessage": message_json("m2", "ASSISTANT", "Pay As You Earn is...")
        }))
        .unwrap();

        assert_eq!(exchange.user_message.id, MessageId::Confirmed("m1".to_string()));
        assert_eq!(exchange.user_message.role, Role::User);
        let reply = exchange.assistant_message.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Pay As You Earn is...");
    }

    #[test]
    fn test_exchange_from_bare_user_message() {
        let exchange = parse_exchange(message_json("m1", "USER", "hello")).unwrap();
        assert_eq!(exchange.user_message.content, "hello");
        assert!(exchange.assistant_message.is_none());
    }

    #[test]
    fn test_created_at_preferred_over_timestamp() {
        let message: Message = serde_json::from_value::<ApiMessage>(message_json("m1", "USER", "x"))
            .unwrap()
            .into();
        assert_eq!(message.created_at.to_rfc3339(), "2025-01-05T10:00:01+00:00");
    }

    #[test]
    fn test_attachment_shapes() {
        let mut raw = message_json("m1", "USER", "see attached");
        raw["attachments"] = json!(["https://cdn/a.pdf", {"url": "https://cdn/b.png", "size": 10}, 42]);
        let message: Message = serde_json::from_value::<ApiMessage>(raw).unwrap().into();
        assert_eq!(message.attachments, vec!["https://cdn/a.pdf", "https://cdn/b.png"]);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let raw = json!([message_json("m1", "SYSTEM", "x")]);
        assert!(parse_messages(raw).is_err());
    }
}
