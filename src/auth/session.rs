use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::tokens::{is_token_expired, TokenStore};
use crate::gateway::AuthGrant;
use crate::models::User;
use crate::utils::{Result, UserFacingError};

/// Authentication endpoints of the REST API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant>;

    /// `POST /auth/signup`
    async fn signup(&self, name: &str, email: &str, password: &str) -> Result<AuthGrant>;

    /// `GET /auth/me`
    async fn current_user(&self) -> Result<User>;

    /// `POST /auth/refresh`, returning the new access token
    async fn refresh(&self, refresh_token: &str) -> Result<String>;
}

/// Observable authentication state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

/// Tracks who is logged in and keeps the shared [`TokenStore`] in sync
pub struct AuthSession {
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    state: Mutex<AuthState>,
}

impl AuthSession {
    pub fn new(api: Arc<dyn AuthApi>, tokens: TokenStore) -> Self {
        Self {
            api,
            tokens,
            state: Mutex::new(AuthState::default()),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.lock().clone()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn login(&self, email: &str, password: &str) -> std::result::Result<User, UserFacingError> {
        self.state.lock().is_loading = true;
        let result = self.api.login(email, password).await;
        self.accept_grant(result, "Login failed. Please try again.")
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> std::result::Result<User, UserFacingError> {
        self.state.lock().is_loading = true;
        let result = self.api.signup(name, email, password).await;
        self.accept_grant(result, "Signup failed. Please try again.")
    }

    fn accept_grant(
        &self,
        result: Result<AuthGrant>,
        fallback: &str,
    ) -> std::result::Result<User, UserFacingError> {
        match result {
            Ok(grant) => {
                self.tokens.set(grant.access_token, grant.refresh_token);
                info!("Signed in as {}", grant.user.email);
                *self.state.lock() = AuthState {
                    user: Some(grant.user.clone()),
                    is_authenticated: true,
                    is_loading: false,
                };
                Ok(grant.user)
            }
            Err(err) => {
                warn!("Authentication failed: {}", err);
                self.state.lock().is_loading = false;
                let message = err.server_message().unwrap_or(fallback).to_string();
                Err(UserFacingError::new(message, err))
            }
        }
    }

    /// Re-validate the stored token against `/auth/me`
    ///
    /// An expired access token is refreshed first when a refresh token exists.
    /// Any failure leaves the session logged out; this never errors.
    pub async fn check_auth(&self) -> Option<User> {
        let access = self.tokens.access_token();
        if access.is_none() {
            self.mark_logged_out();
            return None;
        }

        if is_token_expired(access.as_deref()) && self.tokens.refresh_token().is_some() {
            debug!("Access token expired, refreshing");
            if self.refresh().await.is_err() {
                return None;
            }
        }

        self.state.lock().is_loading = true;
        match self.api.current_user().await {
            Ok(user) => {
                *self.state.lock() = AuthState {
                    user: Some(user.clone()),
                    is_authenticated: true,
                    is_loading: false,
                };
                Some(user)
            }
            Err(err) => {
                warn!("Session check failed: {}", err);
                self.logout();
                None
            }
        }
    }

    /// Exchange the refresh token for a new access token; logs out on failure
    pub async fn refresh(&self) -> std::result::Result<(), UserFacingError> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            return Ok(());
        };

        match self.api.refresh(&refresh_token).await {
            Ok(access_token) => {
                self.tokens.set_access_token(access_token);
                Ok(())
            }
            Err(err) => {
                self.logout();
                Err(UserFacingError::new(
                    "Your session has expired. Please log in again.",
                    err,
                ))
            }
        }
    }

    pub fn logout(&self) {
        self.tokens.clear();
        self.mark_logged_out();
    }

    fn mark_logged_out(&self) {
        *self.state.lock() = AuthState::default();
    }
}
