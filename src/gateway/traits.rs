use async_trait::async_trait;

use crate::models::{Conversation, Message, MessageExchange, SendMessageRequest};
use crate::utils::Result;

/// REST boundary for conversations and messages
///
/// The session manager only ever talks to the backend through this trait, so
/// tests and alternative transports can stand in for [`super::HttpGateway`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiGateway: Send + Sync {
    /// `POST /conversations`
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation>;

    /// `GET /conversations`
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// `GET /conversations/{id}/messages`
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// `POST /conversations/{id}/messages`
    async fn send_message(
        &self,
        conversation_id: &str,
        request: SendMessageRequest,
    ) -> Result<MessageExchange>;

    /// `DELETE /conversations/{id}`
    async fn delete_conversation(&self, conversation_id: &str) -> Result<()>;

    /// `PATCH /conversations/{id}`
    async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<()>;
}
