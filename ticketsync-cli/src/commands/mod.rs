pub mod completion;
pub mod config;
pub mod follow;
pub mod history;

use anyhow::{Result, bail};
use engine::SyncController;
use serde_json::Value;
use shared::models::{ConversationId, Message};

/// One line per message: timestamp, id, then the payload. String payloads and
/// objects with a string `body` are printed as text, anything else as JSON.
pub fn format_message(message: &Message) -> String {
    let text = match &message.payload {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Object(fields) => match fields.get("body") {
            Some(Value::String(body)) => body.clone(),
            _ => message.payload.to_string(),
        },
        other => other.to_string(),
    };
    format!("[{}] {}: {}", message.timestamp, message.id, text)
        .trim_end()
        .to_string()
}

pub fn print_messages(messages: &[Message]) {
    for message in messages {
        println!("{}", format_message(message));
    }
}

/// Waits for the newest page. An initial-load failure is fatal for every
/// command.
pub async fn load_initial(
    controller: &mut SyncController,
    conversation_id: &ConversationId,
) -> Result<()> {
    controller.settle().await;
    if let Some(err) = controller.state().requests.initial.error() {
        bail!("failed to load conversation {conversation_id}: {err}");
    }
    Ok(())
}
