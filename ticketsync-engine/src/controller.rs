//! Drives one conversation: issues requests, forwards pushes and discards
//! results that belong to a conversation which is no longer active.
//!
//! Adapters run on their own tasks. Every result comes back through a
//! channel tagged with the [`ConversationContext`] that was active when the
//! request was issued, and is only applied if that context is still the
//! active one. Call [`SyncController::process_next`] (or
//! [`SyncController::process_pending`]) from the owning task to apply them.

use std::{future::Future, sync::Arc, time::Instant};

use metrics::{counter, histogram};
use shared::models::{ConversationId, FetchMode, Message, MessageBatch, MessageId};
use tokio::{
    runtime::Handle,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError},
};
use tracing::{debug, info, warn};

use crate::{
    adapters::{AdapterSet, Push, PushHandler, SourceAdapter, Subscription},
    errors::AdapterError,
    reducer::{DropReason, EventKind, SyncEvent, SyncState, Transition, reduce},
};

/// Identity an asynchronous result is checked against before it may touch
/// the window. `generation` changes on every start and stop, so restarting
/// the same conversation still invalidates older requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    pub conversation_id: ConversationId,
    pub fetch_mode: FetchMode,
    pub generation: u64,
}

/// What happened to one delivered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    Dropped(DropReason),
    /// The result belonged to a conversation that is no longer active.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub kind: EventKind,
    pub disposition: Disposition,
    /// Set for pushed and updated messages.
    pub message_id: Option<MessageId>,
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Initial,
    Previous,
}

impl Request {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Previous => "previous",
        }
    }

    fn complete(self, result: Result<MessageBatch, AdapterError>) -> Completion {
        match self {
            Self::Initial => Completion::Initial(result),
            Self::Previous => Completion::Previous(result),
        }
    }
}

#[derive(Debug)]
enum Completion {
    Initial(Result<MessageBatch, AdapterError>),
    Previous(Result<MessageBatch, AdapterError>),
    Push(Push),
}

impl Completion {
    fn into_event(self) -> SyncEvent {
        match self {
            Self::Initial(Ok(batch)) => SyncEvent::InitialSucceeded(batch),
            Self::Initial(Err(err)) => SyncEvent::InitialFailed(err),
            Self::Previous(Ok(batch)) => SyncEvent::PreviousSucceeded(batch),
            Self::Previous(Err(err)) => SyncEvent::PreviousFailed(err),
            Self::Push(Push::Append(message)) => SyncEvent::MessagePushed(message),
            Self::Push(Push::Update(message)) => SyncEvent::MessageUpdated(message),
            Self::Push(Push::Failed(err)) => SyncEvent::SubscriptionFailed(err),
            Self::Push(Push::Closed(err)) => SyncEvent::SubscriptionLost(err),
        }
    }
}

#[derive(Debug)]
struct Envelope {
    context: ConversationContext,
    completion: Completion,
}

#[derive(Debug)]
struct ActiveConversation {
    context: ConversationContext,
    adapter: Arc<dyn SourceAdapter>,
    subscription: Option<Subscription>,
}

/// Owns the message window and request state of the conversation currently
/// shown to the user.
#[derive(Debug)]
pub struct SyncController {
    adapters: AdapterSet,
    active: Option<ActiveConversation>,
    generation: u64,
    state: SyncState,
    completions_tx: UnboundedSender<Envelope>,
    completions_rx: UnboundedReceiver<Envelope>,
}

impl SyncController {
    #[must_use]
    pub fn new(adapters: AdapterSet) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            adapters,
            active: None,
            generation: 0,
            state: SyncState::default(),
            completions_tx,
            completions_rx,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    /// The conversation results are currently accepted for, if any.
    #[must_use]
    pub fn context(&self) -> Option<&ConversationContext> {
        self.active.as_ref().map(|active| &active.context)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Makes `conversation_id` the active conversation with an empty window,
    /// requests its newest page and, in live mode, opens the push channel.
    /// Anything still in flight for a previous conversation becomes stale.
    pub fn start(&mut self, conversation_id: impl Into<ConversationId>, fetch_mode: FetchMode) {
        self.begin(conversation_id.into(), fetch_mode, true);
    }

    /// Like [`start`](Self::start) but never opens the push channel, for
    /// callers that only read history.
    pub fn start_history(
        &mut self,
        conversation_id: impl Into<ConversationId>,
        fetch_mode: FetchMode,
    ) {
        self.begin(conversation_id.into(), fetch_mode, false);
    }

    fn begin(&mut self, conversation_id: ConversationId, fetch_mode: FetchMode, subscribe: bool) {
        self.stop();

        self.generation += 1;
        let context = ConversationContext {
            conversation_id,
            fetch_mode,
            generation: self.generation,
        };
        info!(
            conversation_id = %context.conversation_id,
            fetch_mode = %fetch_mode,
            generation = context.generation,
            subscribe,
            "starting conversation sync"
        );

        self.state = SyncState::default();
        self.active = Some(ActiveConversation {
            context: context.clone(),
            adapter: self.adapters.for_mode(fetch_mode),
            subscription: None,
        });

        self.request_initial();

        if subscribe && fetch_mode == FetchMode::Live {
            self.open_subscription(context);
        }
    }

    /// Requests the newest page again for the active conversation, e.g. to
    /// retry a failed initial load. No-op while one is already in flight.
    pub fn reload(&mut self) -> bool {
        if self.active.is_none() || self.state.requests.initial.is_fetching() {
            return false;
        }
        self.request_initial();
        true
    }

    /// Requests the page before the oldest loaded message. No-op while a
    /// previous-page request is in flight or once history is exhausted.
    pub fn load_previous(&mut self) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        if self.state.requests.previous.is_fetching() {
            debug!("previous page already in flight");
            return false;
        }
        let Some(cursor) = self.state.cursor().cloned() else {
            debug!("history exhausted; nothing older to load");
            return false;
        };

        let context = active.context.clone();
        let adapter = Arc::clone(&active.adapter);

        if !self.dispatch(SyncEvent::PreviousRequested).is_applied() {
            return false;
        }
        let conversation_id = context.conversation_id.clone();
        self.spawn_request(context, Request::Previous, async move {
            adapter.fetch_previous(&conversation_id, &cursor).await
        });
        true
    }

    /// Applies messages produced out of band, e.g. acknowledged sends.
    /// Returns how many were applied.
    pub fn append_messages(&mut self, messages: Vec<Message>) -> usize {
        messages
            .into_iter()
            .map(|message| self.dispatch(SyncEvent::MessagePushed(message)))
            .filter(|transition| transition.is_applied())
            .count()
    }

    /// Applies an out-of-band edit. The message keeps its position.
    pub fn update_message(&mut self, message: Message) -> Transition {
        self.dispatch(SyncEvent::MessageUpdated(message))
    }

    /// Closes the push channel and makes every in-flight result stale. The
    /// window keeps its last contents.
    pub fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        self.generation += 1;

        if let Some(mut subscription) = active.subscription.take() {
            subscription.unsubscribe();
            self.dispatch(SyncEvent::SubscriptionClosed);
        }
        info!(
            conversation_id = %active.context.conversation_id,
            generation = active.context.generation,
            "stopped conversation sync"
        );
    }

    /// Waits for the next delivered result and applies it.
    pub async fn process_next(&mut self) -> Option<Processed> {
        let envelope = self.completions_rx.recv().await?;
        Some(self.apply(envelope))
    }

    /// Applies every result that has already been delivered, without waiting.
    pub fn process_pending(&mut self) -> Vec<Processed> {
        let mut processed = Vec::new();
        loop {
            match self.completions_rx.try_recv() {
                Ok(envelope) => processed.push(self.apply(envelope)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        processed
    }

    /// Applies results until no history request is in flight.
    pub async fn settle(&mut self) {
        while self.active.is_some() && self.state.requests.any_fetching() {
            if self.process_next().await.is_none() {
                break;
            }
        }
    }

    fn request_initial(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let context = active.context.clone();
        let adapter = Arc::clone(&active.adapter);

        self.dispatch(SyncEvent::InitialRequested);
        let conversation_id = context.conversation_id.clone();
        self.spawn_request(context, Request::Initial, async move {
            adapter.fetch_initial(&conversation_id).await
        });
    }

    fn open_subscription(&mut self, context: ConversationContext) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let adapter = Arc::clone(&active.adapter);

        let tx = self.completions_tx.clone();
        let tagged = context.clone();
        let on_push: PushHandler = Arc::new(move |push| {
            // The receiver only closes when the controller is gone.
            let _ = tx.send(Envelope {
                context: tagged.clone(),
                completion: Completion::Push(push),
            });
        });

        match adapter.subscribe(&context.conversation_id, on_push) {
            Ok(subscription) => {
                if let Some(active) = self.active.as_mut() {
                    active.subscription = Some(subscription);
                }
                self.dispatch(SyncEvent::SubscriptionOpened);
            }
            Err(err) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    error = %err,
                    "failed to open push channel"
                );
                counter!("ticketsync_subscription_failures_total").increment(1);
                self.dispatch(SyncEvent::SubscriptionLost(err));
            }
        }
    }

    fn spawn_request<F>(&self, context: ConversationContext, request: Request, fetch: F)
    where
        F: Future<Output = Result<MessageBatch, AdapterError>> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        match Handle::try_current() {
            Ok(handle) => {
                let fetch_task = handle.spawn(async move {
                    let started = Instant::now();
                    let result = fetch.await;
                    histogram!("ticketsync_fetch_latency_ms", "request" => request.as_str())
                        .record(started.elapsed().as_secs_f64() * 1000.0);
                    result
                });
                // A panicking or aborted fetch must still settle its request.
                handle.spawn(async move {
                    let result = fetch_task.await.unwrap_or_else(|err| {
                        warn!(
                            conversation_id = %context.conversation_id,
                            request = request.as_str(),
                            error = %err,
                            "history request task failed"
                        );
                        Err(AdapterError::Transport(format!("request task failed: {err}")))
                    });
                    let _ = tx.send(Envelope {
                        context,
                        completion: request.complete(result),
                    });
                });
            }
            Err(err) => {
                let _ = tx.send(Envelope {
                    context,
                    completion: request.complete(Err(AdapterError::Transport(format!(
                        "no async runtime: {err}"
                    )))),
                });
            }
        }
    }

    fn apply(&mut self, envelope: Envelope) -> Processed {
        let Envelope {
            context,
            completion,
        } = envelope;
        let event = completion.into_event();
        let kind = event.kind();
        let message_id = match &event {
            SyncEvent::MessagePushed(message) | SyncEvent::MessageUpdated(message) => {
                Some(message.id.clone())
            }
            _ => None,
        };

        let is_current = self
            .active
            .as_ref()
            .is_some_and(|active| active.context == context);
        if !is_current {
            debug!(
                event = kind.as_str(),
                conversation_id = %context.conversation_id,
                generation = context.generation,
                current_generation = self.generation,
                "discarding stale result"
            );
            counter!("ticketsync_stale_results_total").increment(1);
            return Processed {
                kind,
                disposition: Disposition::Stale,
                message_id,
            };
        }

        match &event {
            SyncEvent::InitialFailed(err) => log_fetch_failure(&context, Request::Initial, err),
            SyncEvent::PreviousFailed(err) => log_fetch_failure(&context, Request::Previous, err),
            SyncEvent::SubscriptionFailed(err) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    error = %err,
                    "push channel reported an error"
                );
            }
            SyncEvent::SubscriptionLost(err) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    error = %err,
                    "push channel closed"
                );
            }
            _ => {}
        }

        let disposition = match self.dispatch(event) {
            Transition::Applied => Disposition::Applied,
            Transition::Dropped(reason) => Disposition::Dropped(reason),
        };
        Processed {
            kind,
            disposition,
            message_id,
        }
    }

    fn dispatch(&mut self, event: SyncEvent) -> Transition {
        let name = event.name();
        let transition = reduce(&mut self.state, event);
        match transition {
            Transition::Applied => {
                debug!(event = name, items = self.state.window.len(), "applied event");
            }
            Transition::Dropped(reason) => {
                debug!(event = name, reason = reason.as_str(), "dropped event");
                counter!("ticketsync_dropped_events_total", "reason" => reason.as_str())
                    .increment(1);
            }
        }
        transition
    }
}

fn log_fetch_failure(context: &ConversationContext, request: Request, err: &AdapterError) {
    warn!(
        conversation_id = %context.conversation_id,
        request = request.as_str(),
        error = %err,
        "history request failed"
    );
    counter!("ticketsync_fetch_failures_total", "request" => request.as_str()).increment(1);
}
