use std::collections::{HashMap, HashSet};

use shared::models::{Cursor, Message, MessageId};
use tracing::warn;

/// Result of [`MessageWindow::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// A new message was placed at this index.
    Inserted(usize),
    /// An existing message was replaced in place at this index.
    Replaced(usize),
}

/// Ordered, de-duplicated messages of one conversation plus the cursor for
/// the next older page.
///
/// Items are ascending by timestamp with unique ids. The one exception to the
/// ordering is [`MessageWindow::upsert`] on a known id, which replaces the
/// entry where it stands even if its timestamp moved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageWindow {
    items: Vec<Message>,
    earliest_cursor: Option<Cursor>,
    initialized: bool,
}

impl MessageWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[Message] {
        &self.items
    }

    #[must_use]
    pub fn cursor(&self) -> Option<&Cursor> {
        self.earliest_cursor.as_ref()
    }

    /// `true` once an initial batch has been applied.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.items.iter().position(|message| &message.id == id)
    }

    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.items.iter().find(|message| &message.id == id)
    }

    pub fn set_cursor(&mut self, cursor: Option<Cursor>) {
        self.earliest_cursor = cursor;
    }

    /// Replaces every item with `messages`, sorted ascending and
    /// de-duplicated by id. A later duplicate overwrites an earlier one.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        let mut seen: HashMap<MessageId, usize> = HashMap::with_capacity(messages.len());
        let mut items: Vec<Message> = Vec::with_capacity(messages.len());

        for message in messages {
            if let Some(&index) = seen.get(&message.id) {
                items[index] = message;
            } else {
                seen.insert(message.id.clone(), items.len());
                items.push(message);
            }
        }

        items.sort_by_key(|message| message.timestamp);
        self.items = items;
        self.initialized = true;
    }

    /// Puts an older page in front of the current items.
    ///
    /// The page is sorted on its own; nothing is re-sorted across the seam.
    /// Ids already in the window are skipped. Returns how many messages were
    /// added.
    pub fn prepend(&mut self, mut older: Vec<Message>) -> usize {
        if older.is_empty() {
            return 0;
        }

        let known: HashSet<&MessageId> = self.items.iter().map(|message| &message.id).collect();
        let mut batch_ids: HashSet<MessageId> = HashSet::with_capacity(older.len());
        let before = older.len();
        older.retain(|message| !known.contains(&message.id) && batch_ids.insert(message.id.clone()));
        if older.len() != before {
            warn!(
                skipped = before - older.len(),
                "older page repeated ids already in the window"
            );
        }

        older.sort_by_key(|message| message.timestamp);
        let added = older.len();
        older.append(&mut self.items);
        self.items = older;
        added
    }

    /// Replaces the message with the same id where it stands, or inserts it
    /// after the last item whose timestamp is not later than its own.
    pub fn upsert(&mut self, message: Message) -> Upserted {
        if let Some(index) = self.position(&message.id) {
            self.items[index] = message;
            return Upserted::Replaced(index);
        }

        let index = self
            .items
            .iter()
            .rposition(|existing| existing.timestamp <= message.timestamp)
            .map_or(0, |found| found + 1);
        self.items.insert(index, message);
        Upserted::Inserted(index)
    }
}
