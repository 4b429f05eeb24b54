use async_trait::async_trait;
use futures_util::StreamExt;
use metrics::counter;
use shared::models::{ConversationId, Cursor, LiveStreamEvent, MessageBatch, PushKind};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    Push, PushHandler, SourceAdapter, Subscription,
    http::HttpTransport,
    sse::{SseDecoder, SseFrame},
};
use crate::errors::AdapterError;

/// Live session backend: history queries plus a server-sent event stream.
#[derive(Debug, Clone)]
pub struct LiveAdapter {
    transport: HttpTransport,
}

impl LiveAdapter {
    #[must_use]
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl SourceAdapter for LiveAdapter {
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
        on_push: PushHandler,
    ) -> Result<Subscription, AdapterError> {
        let runtime = Handle::try_current()
            .map_err(|err| AdapterError::Subscription(format!("no async runtime: {err}")))?;

        let token = CancellationToken::new();
        let transport = self.transport.clone();
        let conversation_id = conversation_id.clone();
        let cancelled = token.clone();

        runtime.spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {
                    debug!(conversation_id = %conversation_id, "live subscription cancelled");
                }
                result = run_stream(&transport, &conversation_id, &on_push) => {
                    if let Err(err) = result {
                        warn!(conversation_id = %conversation_id, error = %err, "live subscription ended");
                        counter!("ticketsync_subscription_failures_total").increment(1);
                        on_push(Push::Closed(err));
                    }
                }
            }
        });

        Ok(Subscription::from_token(token))
    }
}

/// Reads the event stream until it fails. Always returns an error: a stream
/// that ends cleanly still leaves the conversation without pushes. Every
/// error here is reported as [`Push::Closed`].
async fn run_stream(
    transport: &HttpTransport,
    conversation_id: &ConversationId,
    on_push: &PushHandler,
) -> Result<(), AdapterError> {
    let response = transport.open_event_stream(conversation_id).await?;
    info!(conversation_id = %conversation_id, "live subscription connected");

    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        for frame in decoder.feed(&bytes)? {
            handle_frame(conversation_id, &frame, on_push);
        }
    }

    Err(AdapterError::Subscription("event stream closed".to_string()))
}

fn handle_frame(conversation_id: &ConversationId, frame: &SseFrame, on_push: &PushHandler) {
    let event = match serde_json::from_str::<LiveStreamEvent>(&frame.data) {
        Ok(event) => event,
        Err(err) => {
            warn!(
                conversation_id = %conversation_id,
                event = frame.event.as_deref().unwrap_or("message"),
                error = %err,
                "skipping unparsed live event"
            );
            return;
        }
    };

    match event {
        LiveStreamEvent::MessageCreated { payload } => on_push(Push::new(PushKind::Append, payload)),
        LiveStreamEvent::MessageUpdated { payload } => on_push(Push::new(PushKind::Update, payload)),
        LiveStreamEvent::Error { payload } => {
            warn!(
                conversation_id = %conversation_id,
                code = %payload.code,
                "live stream reported an error"
            );
            on_push(Push::Failed(AdapterError::Stream {
                code: payload.code,
                message: payload.message,
            }));
        }
        LiveStreamEvent::Ping => {}
    }
}
