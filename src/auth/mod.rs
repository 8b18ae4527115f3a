// Gateway module for auth - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod session;
mod tokens;

// Public re-exports - the ONLY way to access auth functionality
pub use session::{AuthApi, AuthSession, AuthState};
pub use tokens::{is_token_expired, AuthTokens, TokenStore};
