use chrono::Utc;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::banner::DismissTimer;
use super::failure::{describe_failure, Action};
use super::state::{LoadState, SessionSnapshot, SessionState};
use super::title::derive_title;
use crate::app::SessionConfig;
use crate::gateway::ApiGateway;
use crate::models::{Conversation, CorrelationId, Message, SendMessageRequest};
use crate::upload::{ProgressCallback, UploadFile, UploadService};
use crate::utils::{TaxChatError, UserFacingError};

pub type SessionResult<T> = std::result::Result<T, UserFacingError>;

struct Inner {
    gateway: Arc<dyn ApiGateway>,
    uploader: Option<Arc<dyn UploadService>>,
    settings: SessionConfig,
    state: Mutex<SessionState>,
    banner: DismissTimer,
    snapshots: watch::Sender<SessionSnapshot>,
}

/// Owns the conversation list, the selected conversation and its messages
///
/// Every mutation happens under one lock and is published as a single
/// [`SessionSnapshot`], so observers never see a half-applied change.
/// Failures are rendered into the error banner and also returned to the
/// caller as a [`UserFacingError`].
#[derive(Clone)]
pub struct ConversationSessionManager {
    inner: Arc<Inner>,
}

impl ConversationSessionManager {
    pub fn new(gateway: Arc<dyn ApiGateway>, settings: SessionConfig) -> Self {
        Self::build(gateway, None, settings)
    }

    pub fn with_uploader(
        gateway: Arc<dyn ApiGateway>,
        uploader: Arc<dyn UploadService>,
        settings: SessionConfig,
    ) -> Self {
        Self::build(gateway, Some(uploader), settings)
    }

    fn build(
        gateway: Arc<dyn ApiGateway>,
        uploader: Option<Arc<dyn UploadService>>,
        settings: SessionConfig,
    ) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                gateway,
                uploader,
                banner: DismissTimer::new(settings.error_dismiss()),
                settings,
                state: Mutex::new(SessionState::default()),
                snapshots,
            }),
        }
    }

    /// Receive a fresh snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Create a conversation server-side and make it current with no messages
    pub async fn create_conversation(&self, title: Option<&str>) -> SessionResult<Conversation> {
        self.update(|state| self.clear_error_in(state));

        match self
            .inner
            .gateway
            .create_conversation(title.map(str::to_string))
            .await
        {
            Ok(conversation) => {
                info!("Created conversation {}", conversation.id);
                self.update(|state| {
                    state.conversations.insert(0, conversation.clone());
                    state.reset_messages(Some(conversation.id.clone()), LoadState::Loaded);
                });
                Ok(conversation)
            }
            Err(err) => Err(self.fail(Action::CreateConversation, err, |_| {})),
        }
    }

    /// Replace the local conversation list with the server's
    pub async fn list_conversations(&self) -> SessionResult<()> {
        let in_flight = self.update(|state| {
            self.clear_error_in(state);
            self.track(state, None)
        });

        match self.inner.gateway.list_conversations().await {
            Ok(conversations) => {
                debug!("Loaded {} conversations", conversations.len());
                self.update(|state| {
                    in_flight.settle(state);
                    state.conversations = conversations;
                });
                Ok(())
            }
            Err(err) => Err(self.fail(Action::LoadConversations, err, |state| {
                in_flight.settle(state)
            })),
        }
    }

    /// Switch the current conversation
    ///
    /// The switch and the message clear happen before this returns; the
    /// returned future fetches the new conversation's messages and applies
    /// them only if no later switch or refresh superseded it. Reselecting the
    /// current conversation is a no-op unless its last fetch failed.
    pub fn select_conversation(&self, conversation_id: Option<&str>) -> BoxFuture<'static, ()> {
        let target = conversation_id.map(str::to_string);
        let fetch = self.update(|state| {
            if let Some(id) = target.as_deref() {
                if state.is_current(id)
                    && matches!(state.message_load, LoadState::Loading | LoadState::Loaded)
                {
                    debug!("Conversation {} already selected", id);
                    return None;
                }
            }

            let load = if target.is_some() {
                LoadState::Loading
            } else {
                LoadState::Idle
            };
            let generation = state.reset_messages(target.clone(), load);
            target.clone().map(|id| (id, generation))
        });

        match fetch {
            Some((id, generation)) => {
                let this = self.clone();
                async move { this.load_messages(id, generation).await }.boxed()
            }
            None => future::ready(()).boxed(),
        }
    }

    /// Refetch the current conversation's messages, keeping in-flight placeholders
    pub async fn refresh_messages(&self) {
        let fetch = self.update(|state| {
            let id = state.current_conversation_id.clone()?;
            state.generation += 1;
            state.message_load = LoadState::Loading;
            Some((id, state.generation))
        });

        if let Some((id, generation)) = fetch {
            self.load_messages(id, generation).await;
        }
    }

    async fn load_messages(&self, conversation_id: String, generation: u64) {
        let err = match self.inner.gateway.list_messages(&conversation_id).await {
            Ok(messages) => {
                self.update(|state| {
                    if !state.accepts(&conversation_id, generation) {
                        debug!("Discarding stale messages for {}", conversation_id);
                        return;
                    }
                    // Sends that settled during the fetch may be missing from it
                    let local = std::mem::replace(&mut state.messages, messages);
                    let (pending, settled): (Vec<Message>, Vec<Message>) =
                        local.into_iter().partition(Message::is_pending);
                    for message in settled {
                        state.push_confirmed(message);
                    }
                    state.messages.extend(pending);
                    state.message_load = LoadState::Loaded;
                });
                return;
            }
            Err(err) => err,
        };

        let message = describe_failure(Action::LoadMessages, &err);
        self.update(|state| {
            if !state.accepts(&conversation_id, generation) {
                debug!("Ignoring stale failure for {}: {}", conversation_id, err);
                return;
            }
            warn!("Loading messages for {} failed: {}", conversation_id, err);
            state.message_load = LoadState::Failed;
            self.raise(state, message);
        });
    }

    /// Send a user message with optimistic reflection in the message list
    ///
    /// `file_ref` must already be uploaded; it is attached as-is. On failure
    /// the placeholder is removed and the message list is left as before.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        file_ref: Option<String>,
    ) -> SessionResult<()> {
        let placeholder = Message::pending(conversation_id, content, file_ref.iter().cloned().collect());
        let correlation = placeholder.correlation();

        let (in_flight, first) = self.update(|state| {
            self.clear_error_in(state);
            if state.is_current(conversation_id) {
                state.messages.push(placeholder);
            }
            // History is only known once the current conversation has loaded
            let first = state.is_current(conversation_id)
                && state.message_load == LoadState::Loaded
                && !state.messages.iter().any(|m| !m.is_pending());
            (self.track(state, correlation), first)
        });

        let request = SendMessageRequest::new(content, file_ref);
        match self.inner.gateway.send_message(conversation_id, request).await {
            Ok(exchange) => {
                let settings = &self.inner.settings;
                self.update(|state| {
                    in_flight.settle(state);
                    if state.is_current(conversation_id) {
                        state.push_confirmed(exchange.user_message);
                        if let Some(reply) = exchange.assistant_message {
                            state.push_confirmed(reply);
                        }
                    } else {
                        debug!("{} is no longer selected, reply not shown", conversation_id);
                    }

                    if let Some(conversation) = state.conversation_mut(conversation_id) {
                        conversation.updated_at = Utc::now();
                        if first && conversation.title == settings.new_conversation_title {
                            conversation.title = derive_title(content, settings.title_max_chars);
                        }
                    }
                });
                Ok(())
            }
            Err(err) => Err(self.fail(Action::SendMessage, err, |state| in_flight.settle(state))),
        }
    }

    /// Upload `file`, then send `content` with the uploaded file attached
    ///
    /// Nothing is sent and no placeholder appears if the upload fails.
    pub async fn send_message_with_file(
        &self,
        conversation_id: &str,
        content: &str,
        file: UploadFile,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> SessionResult<()> {
        let Some(uploader) = self.inner.uploader.clone() else {
            let err = TaxChatError::Config("no upload service configured".to_string());
            return Err(self.fail(Action::UploadFile, err, |_| {}));
        };

        let uploaded = match uploader.upload(conversation_id, file, progress, cancel).await {
            Ok(uploaded) => uploaded,
            Err(err) => return Err(self.fail(Action::UploadFile, err, |_| {})),
        };

        debug!("Attaching {} as {}", uploaded.original_name, uploaded.url);
        self.send_message(conversation_id, content, Some(uploaded.url))
            .await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> SessionResult<()> {
        let in_flight = self.update(|state| {
            self.clear_error_in(state);
            self.track(state, None)
        });

        match self.inner.gateway.delete_conversation(conversation_id).await {
            Ok(()) => {
                info!("Deleted conversation {}", conversation_id);
                self.update(|state| {
                    in_flight.settle(state);
                    state.conversations.retain(|c| c.id != conversation_id);
                    if state.is_current(conversation_id) {
                        state.reset_messages(None, LoadState::Idle);
                    }
                });
                Ok(())
            }
            Err(err) => Err(self.fail(Action::DeleteConversation, err, |state| {
                in_flight.settle(state)
            })),
        }
    }

    /// Persist a new title; the local entry changes only once the server agrees
    pub async fn rename_conversation(&self, conversation_id: &str, title: &str) -> SessionResult<()> {
        self.update(|state| self.clear_error_in(state));

        match self
            .inner
            .gateway
            .rename_conversation(conversation_id, title)
            .await
        {
            Ok(()) => {
                self.update(|state| {
                    if let Some(conversation) = state.conversation_mut(conversation_id) {
                        conversation.title = title.to_string();
                    }
                });
                Ok(())
            }
            Err(err) => Err(self.fail(Action::RenameConversation, err, |_| {})),
        }
    }

    /// Show `message` in the error banner, restarting the dismissal window
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| self.raise(state, message));
    }

    pub fn clear_error(&self) {
        self.update(|state| self.clear_error_in(state));
    }

    fn update<R>(&self, apply: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.inner.state.lock();
        let result = apply(&mut state);
        self.inner.snapshots.send_replace(state.snapshot());
        result
    }

    fn raise(&self, state: &mut SessionState, message: String) {
        state.next_notice += 1;
        let notice = state.next_notice;
        state.error = Some((notice, message));

        let inner = Arc::downgrade(&self.inner);
        self.inner.banner.restart(move || {
            if let Some(inner) = inner.upgrade() {
                ConversationSessionManager { inner }.dismiss(notice);
            }
        });
    }

    fn dismiss(&self, notice: u64) {
        self.update(|state| {
            if matches!(&state.error, Some((id, _)) if *id == notice) {
                state.error = None;
            }
        });
    }

    fn clear_error_in(&self, state: &mut SessionState) {
        state.error = None;
        self.inner.banner.cancel();
    }

    fn fail(
        &self,
        action: Action,
        err: TaxChatError,
        rollback: impl FnOnce(&mut SessionState),
    ) -> UserFacingError {
        let message = describe_failure(action, &err);
        warn!("{:?} failed: {}", action, err);
        self.update(|state| {
            rollback(state);
            self.raise(state, message.clone());
        });
        UserFacingError::new(message, err)
    }

    fn track(&self, state: &mut SessionState, placeholder: Option<CorrelationId>) -> InFlight<'_> {
        state.in_flight += 1;
        InFlight {
            manager: self,
            placeholder,
            settled: false,
        }
    }
}

/// An outstanding gateway call counted toward `is_loading`
///
/// Settled inside the completing update; if the call's future is dropped
/// first, the count and any placeholder are released on drop instead.
struct InFlight<'a> {
    manager: &'a ConversationSessionManager,
    placeholder: Option<CorrelationId>,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, state: &mut SessionState) {
        self.release(state);
        self.settled = true;
    }

    fn release(&self, state: &mut SessionState) {
        state.in_flight = state.in_flight.saturating_sub(1);
        if let Some(correlation) = self.placeholder {
            state.remove_pending(correlation);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.manager.update(|state| self.release(state));
        }
    }
}
