//! Uniform fetch/subscribe contract over the live and platform backends.

pub mod http;
pub mod live;
pub mod platform;
pub mod sse;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use shared::{
    config::SyncConfig,
    models::{ConversationId, Cursor, FetchMode, Message, MessageBatch, PushKind},
};
use tokio_util::sync::CancellationToken;

use crate::errors::AdapterError;

pub use http::HttpTransport;
pub use live::LiveAdapter;
pub use platform::PlatformAdapter;

/// One delivery on a push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    Append(Message),
    Update(Message),
    /// The channel reported a problem but keeps delivering. Never carries
    /// message data.
    Failed(AdapterError),
    /// The channel ended. Nothing is delivered after this.
    Closed(AdapterError),
}

impl Push {
    #[must_use]
    pub fn new(kind: PushKind, message: Message) -> Self {
        match kind {
            PushKind::Append => Self::Append(message),
            PushKind::Update => Self::Update(message),
        }
    }
}

/// Callback invoked for every push, possibly from another task.
pub type PushHandler = Arc<dyn Fn(Push) + Send + Sync>;

/// Handle to an open push channel. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    token: Option<CancellationToken>,
}

impl Subscription {
    /// A subscription with nothing behind it.
    #[must_use]
    pub fn noop() -> Self {
        Self { token: None }
    }

    /// Ties the subscription to `token`; unsubscribing cancels it.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token: Some(token) }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    pub fn unsubscribe(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// A backend that can serve the history of a conversation.
#[async_trait]
pub trait SourceAdapter: Send + Sync + fmt::Debug {
    /// Newest page of history.
    async fn fetch_initial(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<MessageBatch, AdapterError>;

    /// Page of history older than `before`.
    async fn fetch_previous(
        &self,
        conversation_id: &ConversationId,
        before: &Cursor,
    ) -> Result<MessageBatch, AdapterError>;

    /// Opens the push channel. Does not wait for the channel to connect.
    ///
    /// # Errors
    /// Fails when the channel cannot even be set up.
    fn subscribe(
        &self,
        conversation_id: &ConversationId,
        on_push: PushHandler,
    ) -> Result<Subscription, AdapterError>;
}

/// One adapter per [`FetchMode`].
#[derive(Debug, Clone)]
pub struct AdapterSet {
    live: Arc<dyn SourceAdapter>,
    platform: Arc<dyn SourceAdapter>,
}

impl AdapterSet {
    pub fn new(live: Arc<dyn SourceAdapter>, platform: Arc<dyn SourceAdapter>) -> Self {
        Self { live, platform }
    }

    /// Builds the HTTP-backed live and platform adapters.
    ///
    /// # Errors
    /// Fails when a base URL is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &SyncConfig) -> Result<Self, AdapterError> {
        let live_base = config
            .live_url()
            .map_err(|err| AdapterError::Endpoint(err.to_string()))?;
        let platform_base = config
            .platform_url()
            .map_err(|err| AdapterError::Endpoint(err.to_string()))?;

        let live = LiveAdapter::new(HttpTransport::new(live_base, config)?);
        let platform = PlatformAdapter::new(HttpTransport::new(platform_base, config)?);
        Ok(Self::new(Arc::new(live), Arc::new(platform)))
    }

    #[must_use]
    pub fn for_mode(&self, mode: FetchMode) -> Arc<dyn SourceAdapter> {
        match mode {
            FetchMode::Live => Arc::clone(&self.live),
            FetchMode::Platform => Arc::clone(&self.platform),
        }
    }
}
