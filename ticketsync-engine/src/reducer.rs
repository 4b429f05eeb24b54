//! Pure state transitions for one conversation's message window.
//!
//! [`reduce`] never performs I/O. Events whose precondition does not hold are
//! dropped and reported through [`Transition::Dropped`] so the caller can log
//! them; they never fail.

use shared::models::{Message, MessageBatch};

use crate::{errors::AdapterError, window::MessageWindow};

/// Progress of one kind of history request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    Idle,
    Fetching,
    Loaded,
    Failed(AdapterError),
}

impl LoadPhase {
    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching)
    }

    #[must_use]
    pub const fn error(&self) -> Option<&AdapterError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Initial and previous-page loads are tracked separately so finishing one
/// never clears the other's loading flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    pub initial: LoadPhase,
    pub previous: LoadPhase,
}

impl RequestState {
    #[must_use]
    pub const fn any_fetching(&self) -> bool {
        self.initial.is_fetching() || self.previous.is_fetching()
    }
}

/// Health of the push channel. Kept apart from [`RequestState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    /// The channel reported an error but is still delivering.
    Degraded(AdapterError),
    /// The channel is gone and will not deliver again.
    Closed(AdapterError),
}

impl SubscriptionStatus {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::Degraded(_))
    }

    #[must_use]
    pub const fn error(&self) -> Option<&AdapterError> {
        match self {
            Self::Degraded(err) | Self::Closed(err) => Some(err),
            Self::Inactive | Self::Active => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    pub window: MessageWindow,
    pub requests: RequestState,
    pub subscription: SubscriptionStatus,
}

impl SyncState {
    #[must_use]
    pub fn items(&self) -> &[Message] {
        self.window.items()
    }

    #[must_use]
    pub fn cursor(&self) -> Option<&shared::models::Cursor> {
        self.window.cursor()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    InitialRequested,
    InitialSucceeded(MessageBatch),
    InitialFailed(AdapterError),
    PreviousRequested,
    PreviousSucceeded(MessageBatch),
    PreviousFailed(AdapterError),
    MessagePushed(Message),
    MessageUpdated(Message),
    SubscriptionOpened,
    /// Recoverable error reported on an open channel.
    SubscriptionFailed(AdapterError),
    /// The channel ended, or could not be opened at all.
    SubscriptionLost(AdapterError),
    SubscriptionClosed,
}

impl SyncEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::InitialRequested => EventKind::InitialRequested,
            Self::InitialSucceeded(_) => EventKind::InitialSucceeded,
            Self::InitialFailed(_) => EventKind::InitialFailed,
            Self::PreviousRequested => EventKind::PreviousRequested,
            Self::PreviousSucceeded(_) => EventKind::PreviousSucceeded,
            Self::PreviousFailed(_) => EventKind::PreviousFailed,
            Self::MessagePushed(_) => EventKind::MessagePushed,
            Self::MessageUpdated(_) => EventKind::MessageUpdated,
            Self::SubscriptionOpened => EventKind::SubscriptionOpened,
            Self::SubscriptionFailed(_) => EventKind::SubscriptionFailed,
            Self::SubscriptionLost(_) => EventKind::SubscriptionLost,
            Self::SubscriptionClosed => EventKind::SubscriptionClosed,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Payload-free discriminant of a [`SyncEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    InitialRequested,
    InitialSucceeded,
    InitialFailed,
    PreviousRequested,
    PreviousSucceeded,
    PreviousFailed,
    MessagePushed,
    MessageUpdated,
    SubscriptionOpened,
    SubscriptionFailed,
    SubscriptionLost,
    SubscriptionClosed,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialRequested => "INITIAL_REQUESTED",
            Self::InitialSucceeded => "INITIAL_SUCCEEDED",
            Self::InitialFailed => "INITIAL_FAILED",
            Self::PreviousRequested => "PREVIOUS_REQUESTED",
            Self::PreviousSucceeded => "PREVIOUS_SUCCEEDED",
            Self::PreviousFailed => "PREVIOUS_FAILED",
            Self::MessagePushed => "MESSAGE_PUSHED",
            Self::MessageUpdated => "MESSAGE_UPDATED",
            Self::SubscriptionOpened => "SUBSCRIPTION_OPENED",
            Self::SubscriptionFailed => "SUBSCRIPTION_FAILED",
            Self::SubscriptionLost => "SUBSCRIPTION_LOST",
            Self::SubscriptionClosed => "SUBSCRIPTION_CLOSED",
        }
    }
}

/// Precondition an event failed to meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    InitialNotFetching,
    PreviousAlreadyFetching,
    PreviousNotFetching,
    WindowNotInitialized,
    SubscriptionNotOpen,
}

impl DropReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialNotFetching => "initial_not_fetching",
            Self::PreviousAlreadyFetching => "previous_already_fetching",
            Self::PreviousNotFetching => "previous_not_fetching",
            Self::WindowNotInitialized => "window_not_initialized",
            Self::SubscriptionNotOpen => "subscription_not_open",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Dropped(DropReason),
}

impl Transition {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub fn reduce(state: &mut SyncState, event: SyncEvent) -> Transition {
    match event {
        SyncEvent::InitialRequested => {
            state.requests.initial = LoadPhase::Fetching;
            Transition::Applied
        }
        SyncEvent::InitialSucceeded(batch) => {
            if !state.requests.initial.is_fetching() {
                return Transition::Dropped(DropReason::InitialNotFetching);
            }
            state.window.replace_all(batch.messages);
            state.window.set_cursor(batch.next_cursor);
            state.requests.initial = LoadPhase::Loaded;
            Transition::Applied
        }
        SyncEvent::InitialFailed(err) => {
            if !state.requests.initial.is_fetching() {
                return Transition::Dropped(DropReason::InitialNotFetching);
            }
            state.requests.initial = LoadPhase::Failed(err);
            Transition::Applied
        }
        SyncEvent::PreviousRequested => {
            if state.requests.previous.is_fetching() {
                return Transition::Dropped(DropReason::PreviousAlreadyFetching);
            }
            state.requests.previous = LoadPhase::Fetching;
            Transition::Applied
        }
        SyncEvent::PreviousSucceeded(batch) => {
            if !state.requests.previous.is_fetching() {
                return Transition::Dropped(DropReason::PreviousNotFetching);
            }
            if batch.is_empty() {
                state.window.set_cursor(None);
            } else {
                state.window.prepend(batch.messages);
                state.window.set_cursor(batch.next_cursor);
            }
            state.requests.previous = LoadPhase::Loaded;
            Transition::Applied
        }
        SyncEvent::PreviousFailed(err) => {
            if !state.requests.previous.is_fetching() {
                return Transition::Dropped(DropReason::PreviousNotFetching);
            }
            state.requests.previous = LoadPhase::Failed(err);
            Transition::Applied
        }
        SyncEvent::MessagePushed(message) | SyncEvent::MessageUpdated(message) => {
            if !state.window.is_initialized() {
                return Transition::Dropped(DropReason::WindowNotInitialized);
            }
            state.window.upsert(message);
            // A delivery after a reported error means the channel recovered.
            if matches!(state.subscription, SubscriptionStatus::Degraded(_)) {
                state.subscription = SubscriptionStatus::Active;
            }
            Transition::Applied
        }
        SyncEvent::SubscriptionOpened => {
            state.subscription = SubscriptionStatus::Active;
            Transition::Applied
        }
        SyncEvent::SubscriptionFailed(err) => {
            if !state.subscription.is_open() {
                return Transition::Dropped(DropReason::SubscriptionNotOpen);
            }
            state.subscription = SubscriptionStatus::Degraded(err);
            Transition::Applied
        }
        SyncEvent::SubscriptionLost(err) => {
            state.subscription = SubscriptionStatus::Closed(err);
            Transition::Applied
        }
        SyncEvent::SubscriptionClosed => {
            state.subscription = SubscriptionStatus::Inactive;
            Transition::Applied
        }
    }
}
