pub mod lifecycle;
pub mod types;

pub use lifecycle::{quote_for_reply, MessageLog};
pub use types::{AudioAttachment, Message, MessageId, MessageStatus};
