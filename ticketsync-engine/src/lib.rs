#![cfg_attr(not(test), forbid(unsafe_code))]
//! Keeps the visible message history of one support-ticket conversation in
//! sync with either a live push channel or a paginated platform API.
//!
//! [`MessageWindow`] holds the ordered, de-duplicated messages,
//! [`reducer::reduce`] applies events to it without doing any I/O, and
//! [`SyncController`] issues the requests, forwards pushes and discards
//! results that arrive after the active conversation changed.

pub mod adapters;
pub mod controller;
pub mod errors;
pub mod reducer;
pub mod window;

pub use adapters::{AdapterSet, Push, PushHandler, SourceAdapter, Subscription};
pub use controller::{ConversationContext, Disposition, Processed, SyncController};
pub use errors::AdapterError;
pub use reducer::{
    DropReason, EventKind, LoadPhase, RequestState, SubscriptionStatus, SyncEvent, SyncState,
    Transition,
};
pub use window::MessageWindow;
