use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::timestamp::Timestamp;

/// Stable identifier of a message, unique within one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pagination token pointing just before the oldest loaded message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single conversation entry. The payload is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, millis: i64, payload: Value) -> Self {
        Self {
            id: id.into(),
            timestamp: Timestamp::from_millis(millis),
            payload,
        }
    }
}

/// One page of history as returned by either backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageBatch {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

impl MessageBatch {
    pub fn new(messages: Vec<Message>, next_cursor: Option<Cursor>) -> Self {
        Self {
            messages,
            next_cursor,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `true` when no older history remains behind this batch.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.next_cursor.is_none()
    }

    /// Stable-sorts the batch into ascending timestamp order.
    pub fn sort_ascending(&mut self) {
        self.messages.sort_by_key(|message| message.timestamp);
    }
}
