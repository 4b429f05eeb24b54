//! Scripted in-memory adapter for controller tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use engine::{
    AdapterError, AdapterSet, Push, PushHandler, SourceAdapter, Subscription, SyncController,
};
use serde_json::Value;
use shared::models::{ConversationId, Cursor, Message, MessageBatch};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

type FetchResult = Result<MessageBatch, AdapterError>;

enum Reply {
    Ready(FetchResult),
    Gated(oneshot::Receiver<FetchResult>),
    Panic,
}

/// Releases one gated fetch.
pub struct Gate(oneshot::Sender<FetchResult>);

impl Gate {
    pub fn resolve(self, result: FetchResult) {
        let _ = self.0.send(result);
    }
}

#[derive(Default)]
pub struct ScriptedAdapter {
    initial: Mutex<HashMap<String, VecDeque<Reply>>>,
    previous: Mutex<HashMap<(String, String), VecDeque<Reply>>>,
    handlers: Mutex<HashMap<String, PushHandler>>,
    tokens: Mutex<HashMap<String, CancellationToken>>,
    calls: Mutex<Vec<String>>,
    fail_subscribe: Mutex<Option<AdapterError>>,
}

impl fmt::Debug for ScriptedAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedAdapter").finish_non_exhaustive()
    }
}

impl ScriptedAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_initial(&self, conversation: &str, result: FetchResult) {
        self.initial
            .lock()
            .unwrap()
            .entry(conversation.to_string())
            .or_default()
            .push_back(Reply::Ready(result));
    }

    pub fn gate_initial(&self, conversation: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.initial
            .lock()
            .unwrap()
            .entry(conversation.to_string())
            .or_default()
            .push_back(Reply::Gated(rx));
        Gate(tx)
    }

    /// The next initial fetch for `conversation` panics instead of returning.
    pub fn panic_initial(&self, conversation: &str) {
        self.initial
            .lock()
            .unwrap()
            .entry(conversation.to_string())
            .or_default()
            .push_back(Reply::Panic);
    }

    pub fn reply_previous(&self, conversation: &str, cursor: &str, result: FetchResult) {
        self.previous
            .lock()
            .unwrap()
            .entry((conversation.to_string(), cursor.to_string()))
            .or_default()
            .push_back(Reply::Ready(result));
    }

    pub fn gate_previous(&self, conversation: &str, cursor: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.previous
            .lock()
            .unwrap()
            .entry((conversation.to_string(), cursor.to_string()))
            .or_default()
            .push_back(Reply::Gated(rx));
        Gate(tx)
    }

    pub fn fail_subscribe_with(&self, err: AdapterError) {
        *self.fail_subscribe.lock().unwrap() = Some(err);
    }

    /// Delivers a push as the backend would, from outside the controller.
    pub fn push(&self, conversation: &str, push: Push) {
        let handler = self
            .handlers
            .lock()
            .unwrap()
            .get(conversation)
            .cloned()
            .expect("no subscription for conversation");
        handler(push);
    }

    pub fn is_subscribed(&self, conversation: &str) -> bool {
        self.tokens
            .lock()
            .unwrap()
            .get(conversation)
            .is_some_and(|token| !token.is_cancelled())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Yields until the adapter has seen at least `count` calls.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls().len() < count {
            tokio::task::yield_now().await;
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn resolve(reply: Option<Reply>) -> FetchResult {
        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(AdapterError::Transport("gate dropped".to_string()))),
            Some(Reply::Panic) => panic!("scripted fetch panicked"),
            None => Err(AdapterError::Transport("no scripted reply".to_string())),
        }
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    async fn fetch_initial(&self, conversation_id: &ConversationId) -> FetchResult {
        self.record(format!("initial:{conversation_id}"));
        let reply = self
            .initial
            .lock()
            .unwrap()
            .get_mut(conversation_id.as_str())
            .and_then(VecDeque::pop_front);
        Self::resolve(reply).await
    }

    async fn fetch_previous(
        &self,
        conversation_id: &ConversationId,
        before: &Cursor,
    ) -> FetchResult {
        self.record(format!("previous:{conversation_id}:{before}"));
        let reply = self
            .previous
            .lock()
            .unwrap()
            .get_mut(&(conversation_id.to_string(), before.to_string()))
            .and_then(VecDeque::pop_front);
        Self::resolve(reply).await
    }

    fn subscribe(
        &self,
        conversation_id: &ConversationId,
        on_push: PushHandler,
    ) -> Result<Subscription, AdapterError> {
        self.record(format!("subscribe:{conversation_id}"));
        if let Some(err) = self.fail_subscribe.lock().unwrap().clone() {
            return Err(err);
        }
        let token = CancellationToken::new();
        self.handlers
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), on_push);
        self.tokens
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), token.clone());
        Ok(Subscription::from_token(token))
    }
}

pub fn controller_with(adapter: &Arc<ScriptedAdapter>) -> SyncController {
    let live: Arc<dyn SourceAdapter> = adapter.clone();
    let platform: Arc<dyn SourceAdapter> = adapter.clone();
    SyncController::new(AdapterSet::new(live, platform))
}

pub fn msg(id: &str, ts: i64) -> Message {
    Message::new(id, ts, Value::Null)
}

pub fn batch(messages: Vec<Message>, cursor: Option<&str>) -> MessageBatch {
    MessageBatch::new(messages, cursor.map(Cursor::from))
}

pub fn ids(controller: &SyncController) -> Vec<String> {
    controller
        .state()
        .items()
        .iter()
        .map(|message| message.id.to_string())
        .collect()
}
