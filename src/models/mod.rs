// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod types;

// Public re-exports - the ONLY way to access model types
pub use types::{
    Conversation, CorrelationId, Message, MessageExchange, MessageId, Role, SendMessageRequest,
    UploadResult, User,
};
