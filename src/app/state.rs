use std::sync::Arc;
use tracing::debug;

use crate::app::Config;
use crate::auth::{AuthSession, TokenStore};
use crate::gateway::HttpGateway;
use crate::session::ConversationSessionManager;
use crate::upload::HttpUploader;
use crate::utils::Result;

/// Global application state, wired from configuration
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Bearer tokens shared by every HTTP client
    pub tokens: TokenStore,
    /// Who is logged in
    pub auth: AuthSession,
    /// Conversations and messages
    pub session: ConversationSessionManager,
}

impl AppState {
    /// Create new app state, seeding the token store from the environment
    pub fn new(config: Config) -> Result<Self> {
        let tokens = match config.api.token() {
            Some(token) => {
                debug!("Using bearer token from ${}", config.api.token_env);
                TokenStore::with_access_token(token)
            }
            None => TokenStore::new(),
        };
        Self::with_tokens(config, tokens)
    }

    pub fn with_tokens(config: Config, tokens: TokenStore) -> Result<Self> {
        let gateway = Arc::new(HttpGateway::from_config(&config.api, tokens.clone())?);
        let uploader = Arc::new(HttpUploader::new(
            &config.api,
            &config.upload,
            tokens.clone(),
        )?);

        Ok(Self {
            auth: AuthSession::new(gateway.clone(), tokens.clone()),
            session: ConversationSessionManager::with_uploader(
                gateway,
                uploader,
                config.session.clone(),
            ),
            tokens,
            config,
        })
    }
}
