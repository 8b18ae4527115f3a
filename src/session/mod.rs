// Gateway module for the conversation session - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod banner;
mod failure;
mod manager;
mod state;
mod title;

// Public re-exports - the ONLY way to access session functionality
pub use failure::{describe_failure, Action};
pub use manager::{ConversationSessionManager, SessionResult};
pub use state::SessionSnapshot;
pub use title::derive_title;
