use std::time::{Duration, Instant};

use reqwest::{Client, Response, header::ACCEPT};
use shared::{
    config::SyncConfig,
    models::{ConversationId, Cursor, MessageBatch},
};
use tracing::debug;
use url::Url;

use crate::errors::AdapterError;

const MESSAGES_PATH: &str = "messages";
const EVENTS_PATH: &str = "events";

/// HTTP plumbing shared by both adapters: one backend base URL, one client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    page_size: u32,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport for the backend rooted at `base`.
    ///
    /// Only the connect timeout is set on the client; the request timeout is
    /// applied per history request so the event stream can stay open.
    ///
    /// # Errors
    /// Fails when `base` cannot carry path segments or the client cannot be built.
    pub fn new(base: Url, config: &SyncConfig) -> Result<Self, AdapterError> {
        if base.cannot_be_a_base() {
            return Err(AdapterError::Endpoint(format!("{base} cannot be a base URL")));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base,
            page_size: config.page_size,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, conversation_id: &ConversationId, leaf: &str) -> Result<Url, AdapterError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| AdapterError::Endpoint(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["conversations", conversation_id.as_str(), leaf]);
        Ok(url)
    }

    /// Fetches one page of history, newest first when `before` is `None`.
    /// The returned batch is always in ascending timestamp order.
    ///
    /// # Errors
    /// Transport failures, non-success statuses and undecodable bodies.
    pub async fn fetch_page(
        &self,
        conversation_id: &ConversationId,
        before: Option<&Cursor>,
    ) -> Result<MessageBatch, AdapterError> {
        let mut url = self.endpoint(conversation_id, MESSAGES_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_size.to_string());
            if let Some(cursor) = before {
                query.append_pair("before", cursor.as_str());
            }
        }

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;

        let mut batch: MessageBatch =
            serde_json::from_str(&body).map_err(|err| AdapterError::Decode(err.to_string()))?;
        batch.sort_ascending();

        debug!(
            conversation_id = %conversation_id,
            before = before.map(Cursor::as_str),
            count = batch.messages.len(),
            exhausted = batch.is_exhausted(),
            elapsed = ?started.elapsed(),
            "history page fetched"
        );
        Ok(batch)
    }

    /// Opens the server-sent event stream for a conversation.
    ///
    /// # Errors
    /// Transport failures and non-success statuses.
    pub async fn open_event_stream(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Response, AdapterError> {
        let url = self.endpoint(conversation_id, EVENTS_PATH)?;
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::rejected(status.as_u16(), &body))
}
