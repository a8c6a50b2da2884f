//! Speech engine seam
//!
//! Platform TTS bindings implement [`SpeechEngine`]. Completion callbacks are
//! reported as [`SpeechEvent`]s on a channel instead of closures, so the
//! playback controller can apply them as plain state transitions.

use crate::audio::AudioSessionConfig;
use crate::Result;
use crossbeam_channel::Sender;
use serde::Deserialize;
use uuid::Uuid;

/// Voice parameters for one utterance
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    pub language: String,
    pub pitch: f32,
    pub rate: f32,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            language: "pt-BR".to_string(),
            pitch: 1.0,
            rate: 0.9,
        }
    }
}

impl SpeechOptions {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }
}

/// Event reported by the engine for an utterance
#[derive(Clone, Debug, PartialEq)]
pub enum SpeechEvent {
    Started { utterance_id: Uuid },
    Done { utterance_id: Uuid },
    Error { utterance_id: Uuid, error: String },
}

impl SpeechEvent {
    pub fn utterance_id(&self) -> Uuid {
        match self {
            SpeechEvent::Started { utterance_id }
            | SpeechEvent::Done { utterance_id }
            | SpeechEvent::Error { utterance_id, .. } => *utterance_id,
        }
    }
}

pub trait SpeechEngine {
    /// Begin speaking `text`. Progress is reported on `events` tagged with `utterance_id`.
    fn speak(
        &mut self,
        utterance_id: Uuid,
        text: &str,
        options: &SpeechOptions,
        events: Sender<SpeechEvent>,
    ) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Stop any utterance. Must be harmless when nothing is playing.
    fn stop(&mut self);

    /// Apply the audio session before an utterance starts
    fn acquire_session(&mut self, _config: &AudioSessionConfig) -> Result<()> {
        Ok(())
    }

    /// Give the audio session back once the utterance is torn down
    fn release_session(&mut self) {}
}

impl<E: SpeechEngine + ?Sized> SpeechEngine for Box<E> {
    fn speak(
        &mut self,
        utterance_id: Uuid,
        text: &str,
        options: &SpeechOptions,
        events: Sender<SpeechEvent>,
    ) -> Result<()> {
        (**self).speak(utterance_id, text, options, events)
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<()> {
        (**self).resume()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn acquire_session(&mut self, config: &AudioSessionConfig) -> Result<()> {
        (**self).acquire_session(config)
    }

    fn release_session(&mut self) {
        (**self).release_session()
    }
}
