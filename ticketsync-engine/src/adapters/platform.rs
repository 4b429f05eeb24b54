use async_trait::async_trait;
use shared::models::{ConversationId, Cursor, MessageBatch};
use tracing::debug;

use super::{PushHandler, SourceAdapter, Subscription, http::HttpTransport};
use crate::errors::AdapterError;

/// Paginated request/response backend. It has no push channel.
#[derive(Debug, Clone)]
pub struct PlatformAdapter {
    transport: HttpTransport,
}

impl PlatformAdapter {
    #[must_use]
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl SourceAdapter for PlatformAdapter {
    async fn fetch_initial(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<MessageBatch, AdapterError> {
        self.transport.fetch_page(conversation_id, None).await
    }

    async fn fetch_previous(
        &self,
        conversation_id: &ConversationId,
        before: &Cursor,
    ) -> Result<MessageBatch, AdapterError> {
        self.transport.fetch_page(conversation_id, Some(before)).await
    }

    fn subscribe(
        &self,
        conversation_id: &ConversationId,
        _on_push: PushHandler,
    ) -> Result<Subscription, AdapterError> {
        debug!(conversation_id = %conversation_id, "platform backend has no push channel");
        Ok(Subscription::noop())
    }
}
