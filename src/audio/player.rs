//! Playback of recorded audio messages

use crate::Result;
use crossbeam_channel::Sender;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The clip loaded as `playback_id` played to the end
    Finished { playback_id: Uuid, uri: String },
}

impl PlayerEvent {
    pub fn playback_id(&self) -> Uuid {
        match self {
            PlayerEvent::Finished { playback_id, .. } => *playback_id,
        }
    }
}

pub trait AudioPlayer {
    /// Load a clip, replacing whatever was loaded before
    ///
    /// The finish notification for this clip is sent on `events` tagged with
    /// `playback_id`. A clip that was stopped or replaced must not report.
    fn load(&mut self, playback_id: Uuid, uri: &str, events: Sender<PlayerEvent>) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    /// Stop and unload. Must be harmless when nothing is loaded.
    fn stop(&mut self);
}

impl<P: AudioPlayer + ?Sized> AudioPlayer for Box<P> {
    fn load(&mut self, playback_id: Uuid, uri: &str, events: Sender<PlayerEvent>) -> Result<()> {
        (**self).load(playback_id, uri, events)
    }

    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
