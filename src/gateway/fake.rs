//! Scripted in-memory gateway for exercising the session manager

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

use super::traits::ApiGateway;
use crate::models::{Conversation, Message, MessageExchange, MessageId, Role, SendMessageRequest};
use crate::utils::{Result, TaxChatError};

/// Which gateway call a failure or gate applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Create,
    List,
    Messages,
    Send,
    Delete,
    Rename,
}

#[derive(Debug, Clone)]
pub enum Failure {
    Status(u16, String),
    Network,
}

impl Failure {
    fn into_error(self) -> TaxChatError {
        match self {
            Self::Status(status, body) => TaxChatError::from_status(status, &body),
            Self::Network => TaxChatError::NetworkUnavailable {
                detail: "connection refused".to_string(),
                timed_out: false,
            },
        }
    }
}

#[derive(Default)]
struct FakeState {
    conversations: Vec<Conversation>,
    messages: HashMap<String, Vec<Message>>,
    failures: HashMap<Call, VecDeque<Failure>>,
    calls: Vec<(Call, String)>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
    gates: Mutex<HashMap<(Call, String), Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a conversation with an existing history
    pub fn seed(&self, id: &str, title: &str, history: &[(Role, &str)]) {
        let now = Utc::now();
        let mut state = self.state.lock();
        state.conversations.push(Conversation {
            id: id.to_string(),
            user_id: Some("u1".to_string()),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        });
        let messages = history
            .iter()
            .enumerate()
            .map(|(i, (role, content))| Message {
                id: MessageId::Confirmed(format!("{}-m{}", id, i)),
                conversation_id: id.to_string(),
                role: *role,
                content: content.to_string(),
                created_at: now,
                attachments: Vec::new(),
            })
            .collect();
        state.messages.insert(id.to_string(), messages);
    }

    /// Make the next `call` fail
    pub fn fail_next(&self, call: Call, failure: Failure) {
        self.state
            .lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(failure);
    }

    /// Hold `call` for `key` until the returned gate is notified
    pub fn gate(&self, call: Call, key: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .insert((call, key.to_string()), gate.clone());
        gate
    }

    pub fn calls(&self, call: Call) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(c, _)| *c == call)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Record the call, wait on its gate if any, then pop a scripted failure
    async fn enter(&self, call: Call, key: &str) -> Result<()> {
        self.state.lock().calls.push((call, key.to_string()));
        let gate = self.gates.lock().get(&(call, key.to_string())).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let failure = self
            .state
            .lock()
            .failures
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ApiGateway for FakeGateway {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        self.enter(Call::Create, "").await?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let now = Utc::now();
        let conversation = Conversation {
            id: format!("conv-{}", state.next_id),
            user_id: Some("u1".to_string()),
            title: title.unwrap_or_else(|| "New Conversation".to_string()),
            created_at: now,
            updated_at: now,
        };
        state.conversations.insert(0, conversation.clone());
        state
            .messages
            .insert(conversation.id.clone(), Vec::new());
        Ok(conversation)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.enter(Call::List, "").await?;
        Ok(self.state.lock().conversations.clone())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        // History is read when the request arrives, before any gate
        let history = self.state.lock().messages.get(conversation_id).cloned();
        self.enter(Call::Messages, conversation_id).await?;
        history.ok_or(TaxChatError::NotFound)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        request: SendMessageRequest,
    ) -> Result<MessageExchange> {
        self.enter(Call::Send, conversation_id).await?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let n = state.next_id;
        let history = state
            .messages
            .get_mut(conversation_id)
            .ok_or(TaxChatError::NotFound)?;
        let now = Utc::now();
        let user_message = Message {
            id: MessageId::Confirmed(format!("msg-{}-user", n)),
            conversation_id: conversation_id.to_string(),
            role: Role::User,
            content: request.content.clone(),
            created_at: now,
            attachments: request.attachments.unwrap_or_default(),
        };
        let assistant_message = Message {
            id: MessageId::Confirmed(format!("msg-{}-assistant", n)),
            conversation_id: conversation_id.to_string(),
            role: Role::Assistant,
            content: format!("Here is what I know about: {}", request.content),
            created_at: now,
            attachments: Vec::new(),
        };
        history.push(user_message.clone());
        history.push(assistant_message.clone());
        Ok(MessageExchange {
            user_message,
            assistant_message: Some(assistant_message),
        })
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        self.enter(Call::Delete, conversation_id).await?;
        let mut state = self.state.lock();
        state.conversations.retain(|c| c.id != conversation_id);
        state.messages.remove(conversation_id);
        Ok(())
    }

    async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<()> {
        self.enter(Call::Rename, conversation_id).await?;
        let mut state = self.state.lock();
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or(TaxChatError::NotFound)?;
        conversation.title = title.to_string();
        Ok(())
    }
}
