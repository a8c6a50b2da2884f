//! Ordered conversation log with provisional-message bookkeeping

use super::types::{Message, MessageId, MessageStatus};
use crate::{ChatError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

const REPLY_QUOTE_CHARS: usize = 30;

/// The message log
///
/// Cloning yields another handle onto the same log.
#[derive(Debug, Clone)]
pub struct MessageLog {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a user text message with status `sent`
    pub fn append_user_message(&self, text: &str) -> Message {
        let message = Message::user(text);
        self.messages.write().push(message.clone());
        debug!("Appended user message {}", message.id);
        message
    }

    /// Append a user message carrying a recorded audio clip
    pub fn append_user_audio_message(&self, label: &str, uri: &str, duration_secs: u32) -> Message {
        let message = Message::user(label).with_audio(uri, duration_secs);
        self.messages.write().push(message.clone());
        debug!("Appended user audio message {} ({})", message.id, uri);
        message
    }

    pub fn mark_delivered(&self, id: MessageId) -> bool {
        self.advance_status(id, MessageStatus::Delivered)
    }

    pub fn mark_read(&self, id: MessageId) -> bool {
        self.advance_status(id, MessageStatus::Read)
    }

    fn advance_status(&self, id: MessageId, next: MessageStatus) -> bool {
        let mut messages = self.messages.write();
        let Some(message) = messages.iter_mut().find(|m| m.id == id && m.is_user) else {
            return false;
        };

        match message.status {
            Some(current) if current >= next => false,
            _ => {
                message.status = Some(next);
                true
            }
        }
    }

    /// Create the hidden assistant message for a turn that is about to be spoken
    ///
    /// Fails if a previous provisional message was never promoted.
    pub fn create_provisional_assistant_message(&self, text: &str) -> Result<Message> {
        let mut messages = self.messages.write();
        if let Some(existing) = messages.iter().find(|m| m.is_provisional()) {
            warn!("Refusing second provisional message, {} still hidden", existing.id);
            return Err(ChatError::ProvisionalInFlight(existing.id.to_string()));
        }

        let message = Message::assistant(text).hidden();
        messages.push(message.clone());
        debug!("Created provisional message {}", message.id);
        Ok(message)
    }

    /// Make a provisional message visible
    ///
    /// Returns `true` only when the message actually changed.
    pub fn promote(&self, id: MessageId) -> bool {
        let mut messages = self.messages.write();
        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) if message.hidden => {
                message.hidden = false;
                debug!("Promoted message {}", id);
                true
            }
            _ => false,
        }
    }

    /// Append an assistant message that skips the reveal pipeline
    pub fn append_assistant_message(&self, text: &str) -> Message {
        let message = Message::assistant(text);
        self.messages.write().push(message.clone());
        message
    }

    /// Messages the UI should render, in insertion order
    pub fn visible(&self) -> Vec<Message> {
        self.messages
            .read()
            .iter()
            .filter(|m| !m.hidden)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.messages.read().iter().find(|m| m.id == id).cloned()
    }

    pub fn get_all(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn provisional(&self) -> Option<Message> {
        self.messages.read().iter().find(|m| m.is_provisional()).cloned()
    }

    pub fn hidden_count(&self) -> usize {
        self.messages.read().iter().filter(|m| m.hidden).count()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix placed in the input box when replying to a message
pub fn quote_for_reply(message: &Message) -> String {
    let speaker = if message.is_user { "Você: " } else { "Assistente: " };
    let mut quoted: String = message.text.chars().take(REPLY_QUOTE_CHARS).collect();
    if message.text.chars().count() > REPLY_QUOTE_CHARS {
        quoted.push_str("...");
    }
    format!("[Resposta à \"{}{}\"] \n", speaker, quoted)
}
