use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::envelope::unwrap_envelope;
use super::traits::ApiGateway;
use super::wire::{parse_exchange, parse_messages, AuthGrant, RefreshGrant};
use crate::app::ApiConfig;
use crate::auth::{AuthApi, TokenStore};
use crate::models::{Conversation, Message, MessageExchange, SendMessageRequest, User};
use crate::utils::{Result, TaxChatError};

/// [`ApiGateway`] over HTTPS with bearer-token authentication
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    tokens: TokenStore,
}

impl HttpGateway {
    /// Create a gateway rooted at `base_url` (e.g. `https://api.example.com/api`)
    pub fn new(base_url: &str, timeout: Duration, tokens: TokenStore) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaxChatError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    pub fn from_config(config: &ApiConfig, tokens: TokenStore) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout(), tokens)
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, segments: &[&str]) -> Url {
        endpoint(&self.base_url, segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and return the unwrapped JSON payload
    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("{} {} failed", status.as_u16(), url.path());
            return Err(TaxChatError::from_status(status.as_u16(), &body));
        }

        debug!("{} {}", status.as_u16(), url.path());
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        unwrap_envelope(serde_json::from_str(&body)?)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let data = self.execute(request).await?;
        Ok(serde_json::from_value(data)?)
    }
}

/// Parse the API root; it must be able to carry path segments
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| TaxChatError::Config(format!("invalid API base URL '{}': {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(TaxChatError::Config(format!(
            "API base URL '{}' cannot carry a path",
            raw
        )));
    }
    Ok(url)
}

/// Append percent-encoded path segments to the API root
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let url = self.url(&["conversations"]);
        self.fetch(self.client.post(url).json(&json!({ "title": title })))
            .await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let url = self.url(&["conversations"]);
        self.fetch(self.client.get(url)).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let url = self.url(&["conversations", conversation_id, "messages"]);
        parse_messages(self.execute(self.client.get(url)).await?)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        request: SendMessageRequest,
    ) -> Result<MessageExchange> {
        let url = self.url(&["conversations", conversation_id, "messages"]);
        parse_exchange(self.execute(self.client.post(url).json(&request)).await?)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let url = self.url(&["conversations", conversation_id]);
        self.execute(self.client.delete(url)).await?;
        Ok(())
    }

    async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<()> {
        let url = self.url(&["conversations", conversation_id]);
        self.execute(self.client.patch(url).json(&json!({ "title": title })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for HttpGateway {
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant> {
        let url = self.url(&["auth", "login"]);
        let body = json!({ "email": email, "password": password });
        self.fetch(self.client.post(url).json(&body)).await
    }

    async fn signup(&self, name: &str, email: &str, password: &str) -> Result<AuthGrant> {
        let url = self.url(&["auth", "signup"]);
        let body = json!({ "name": name, "email": email, "password": password });
        self.fetch(self.client.post(url).json(&body)).await
    }

    async fn current_user(&self) -> Result<User> {
        let url = self.url(&["auth", "me"]);
        self.fetch(self.client.get(url)).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let url = self.url(&["auth", "refresh"]);
        let body = json!({ "refreshToken": refresh_token });
        let grant: RefreshGrant = self.fetch(self.client.post(url).json(&body)).await?;
        Ok(grant.access_token)
    }
}
