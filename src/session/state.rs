use serde::Serialize;

use crate::models::{Conversation, CorrelationId, Message};

/// Progress of the current conversation's message fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No conversation selected
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Everything the session manager owns, mutated only under its lock
#[derive(Debug, Default)]
pub struct SessionState {
    pub conversations: Vec<Conversation>,
    pub current_conversation_id: Option<String>,
    /// Messages of the current conversation only
    pub messages: Vec<Message>,
    /// Bumped whenever the current conversation's message list is reset or refetched
    pub generation: u64,
    pub message_load: LoadState,
    /// Sends, list loads and deletes still waiting on the gateway
    pub in_flight: usize,
    /// Banner text tagged with the notice id its dismissal timer expects
    pub error: Option<(u64, String)>,
    pub next_notice: u64,
}

impl SessionState {
    pub fn is_current(&self, conversation_id: &str) -> bool {
        self.current_conversation_id.as_deref() == Some(conversation_id)
    }

    /// Whether a fetch issued for `conversation_id` at `generation` may still apply
    pub fn accepts(&self, conversation_id: &str, generation: u64) -> bool {
        self.generation == generation && self.is_current(conversation_id)
    }

    /// Point the session at `conversation_id` with an empty message list
    pub fn reset_messages(&mut self, conversation_id: Option<String>, load: LoadState) -> u64 {
        self.current_conversation_id = conversation_id;
        self.messages.clear();
        self.generation += 1;
        self.message_load = load;
        self.generation
    }

    /// Drop the optimistic entry for `correlation`, wherever it now sits
    pub fn remove_pending(&mut self, correlation: CorrelationId) {
        self.messages
            .retain(|m| m.correlation() != Some(correlation));
    }

    /// Append a confirmed message unless the list already holds it
    pub fn push_confirmed(&mut self, message: Message) {
        let duplicate = message.id.confirmed().is_some()
            && self.messages.iter().any(|m| m.id == message.id);
        if !duplicate {
            self.messages.push(message);
        }
    }

    pub fn conversation_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
    }

    pub fn is_loading(&self) -> bool {
        self.message_load == LoadState::Loading || self.in_flight > 0
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            conversations: self.conversations.clone(),
            current_conversation_id: self.current_conversation_id.clone(),
            messages: self.messages.clone(),
            is_loading: self.is_loading(),
            error: self.error.as_ref().map(|(_, message)| message.clone()),
        }
    }
}

/// Read-only view published to observers after every mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub conversations: Vec<Conversation>,
    pub current_conversation_id: Option<String>,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn current_conversation(&self) -> Option<&Conversation> {
        let id = self.current_conversation_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, Role};
    use chrono::Utc;

    fn confirmed(id: &str, content: &str) -> Message {
        Message {
            id: MessageId::Confirmed(id.to_string()),
            conversation_id: "c1".to_string(),
            role: Role::User,
            content: content.to_string(),
            created_at: Utc::now(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_remove_pending_only_touches_its_own_placeholder() {
        let mut state = SessionState::default();
        let first = Message::pending("c1", "one", Vec::new());
        let second = Message::pending("c1", "two", Vec::new());
        state.messages = vec![confirmed("m1", "hi"), first.clone(), second.clone()];

        state.remove_pending(first.correlation().unwrap());

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1], second);
    }

    #[test]
    fn test_push_confirmed_skips_duplicates() {
        let mut state = SessionState::default();
        state.push_confirmed(confirmed("m1", "hi"));
        state.push_confirmed(confirmed("m1", "hi"));
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn test_loading_is_derived() {
        let mut state = SessionState::default();
        assert!(!state.is_loading());

        state.reset_messages(Some("c1".to_string()), LoadState::Loading);
        assert!(state.snapshot().is_loading);

        state.message_load = LoadState::Loaded;
        state.in_flight = 1;
        assert!(state.is_loading());
        state.in_flight = 0;
        assert!(!state.is_loading());
    }

    #[test]
    fn test_generation_guard() {
        let mut state = SessionState::default();
        let a = state.reset_messages(Some("a".to_string()), LoadState::Loading);
        let b = state.reset_messages(Some("b".to_string()), LoadState::Loading);

        assert!(!state.accepts("a", a));
        assert!(state.accepts("b", b));
        assert!(!state.accepts("a", b));
    }
}
