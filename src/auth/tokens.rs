use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;

/// Access/refresh token pair for the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Shared in-memory token holder
///
/// Cloning yields another handle to the same tokens, so the gateway and the
/// auth session always agree on who is logged in.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<AuthTokens>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an access token, e.g. from the environment
    pub fn with_access_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token.into(), None);
        store
    }

    pub fn set(&self, access_token: String, refresh_token: Option<String>) {
        *self.inner.write() = Some(AuthTokens {
            access_token,
            refresh_token,
        });
    }

    /// Swap in a refreshed access token, keeping the refresh token
    pub fn set_access_token(&self, access_token: String) {
        let mut guard = self.inner.write();
        let refresh_token = guard.as_ref().and_then(|t| t.refresh_token.clone());
        *guard = Some(AuthTokens {
            access_token,
            refresh_token,
        });
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.read().as_ref().map(|t| t.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Whether a JWT's `exp` claim has passed
///
/// Only the payload is decoded; the signature is the server's business.
/// Missing or malformed tokens count as expired.
pub fn is_token_expired(token: Option<&str>) -> bool {
    let Some(token) = token else {
        return true;
    };
    let Some(payload) = token.split('.').nth(1) else {
        return true;
    };
    let payload = payload.trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload));
    let Ok(bytes) = decoded else {
        return true;
    };
    match serde_json::from_slice::<Claims>(&bytes) {
        Ok(Claims { exp: Some(exp) }) => chrono::Utc::now().timestamp() as f64 >= exp,
        _ => true,
    }
}

#[cfg(test)]
pub(crate) fn fake_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}
