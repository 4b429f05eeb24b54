pub mod conversation;
pub mod errors;
pub mod message;
pub mod stream;
pub mod timestamp;

pub use conversation::{ConversationId, FetchMode, PushKind};
pub use errors::ErrorResponse;
pub use message::{Cursor, Message, MessageBatch, MessageId};
pub use stream::{LiveStreamEvent, StreamErrorEvent};
pub use timestamp::Timestamp;
