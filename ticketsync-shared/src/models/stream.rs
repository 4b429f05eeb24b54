use serde::{Deserialize, Serialize};

use super::message::Message;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamErrorEvent {
    pub code: String,
    pub message: String,
}

/// Body of one server-sent event on the live conversation channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LiveStreamEvent {
    #[serde(rename = "message.created")]
    MessageCreated { payload: Message },
    #[serde(rename = "message.updated")]
    MessageUpdated { payload: Message },
    #[serde(rename = "error")]
    Error { payload: StreamErrorEvent },
    #[serde(rename = "ping")]
    Ping,
}

impl LiveStreamEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message.created",
            Self::MessageUpdated { .. } => "message.updated",
            Self::Error { .. } => "error",
            Self::Ping => "ping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_created_event() {
        let raw = r#"{"type":"message.created","payload":{"id":"m-3","timestamp":"2024-05-01T12:00:00Z","payload":{"body":"hi"}}}"#;
        let event: LiveStreamEvent = serde_json::from_str(raw).unwrap();
        match event {
            LiveStreamEvent::MessageCreated { payload } => {
                assert_eq!(payload.id.as_str(), "m-3");
                assert_eq!(payload.payload, json!({"body": "hi"}));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn parses_ping_without_payload() {
        let event: LiveStreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(event, LiveStreamEvent::Ping);
        assert_eq!(event.name(), "ping");
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(serde_json::from_str::<LiveStreamEvent>(r#"{"type":"typing.update"}"#).is_err());
    }
}
