//! Chat backend seam
//!
//! The backend answers asynchronously: replies are pushed onto a channel the
//! orchestrator drains on its own schedule.

pub mod canned;

pub use canned::{canned_response, CannedBackend};

use crate::ChatError;
use crossbeam_channel::Sender;
use uuid::Uuid;

/// Outcome of one backend request
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub request_id: Uuid,
    pub result: std::result::Result<String, ChatError>,
}

impl BackendReply {
    pub fn ok(request_id: Uuid, response: impl Into<String>) -> Self {
        Self {
            request_id,
            result: Ok(response.into()),
        }
    }

    pub fn err(request_id: Uuid, error: ChatError) -> Self {
        Self {
            request_id,
            result: Err(error),
        }
    }
}

pub trait ChatBackend {
    /// Start answering `text`; exactly one [`BackendReply`] tagged with `request_id`
    /// should eventually arrive on `replies`
    fn send_message(&mut self, request_id: Uuid, text: &str, replies: Sender<BackendReply>);
}

impl<B: ChatBackend + ?Sized> ChatBackend for Box<B> {
    fn send_message(&mut self, request_id: Uuid, text: &str, replies: Sender<BackendReply>) {
        (**self).send_message(request_id, text, replies)
    }
}
