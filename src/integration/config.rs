//! Configuration for the chat core
//!
//! Provides centralized configuration for all components. Every field has a
//! default, so a TOML file only needs to list what it overrides.

use crate::audio::AudioSessionConfig;
use crate::speech::{RevealConfig, SpeechOptions};
use crate::{ChatError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Delays driving the turn lifecycle, all in milliseconds
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Simulated network acknowledgement before a user message shows as delivered
    pub delivery_delay_ms: u64,

    /// Gap between creating the provisional message and starting speech
    pub speak_delay_ms: u64,

    /// Indicator hide delay after the user pauses a fully revealed reply
    pub pause_hide_delay_ms: u64,

    /// Indicator hide delay after playback finishes or fails
    pub finish_hide_delay_ms: u64,

    /// Indicator hide delay when the user taps a finished indicator
    pub dismiss_delay_ms: u64,

    /// Delay between an audio message being delivered and the canned reply
    pub audio_reply_delay_ms: u64,

    /// Give up on the backend after this long; `None` waits forever
    pub backend_timeout_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            delivery_delay_ms: 1000,
            speak_delay_ms: 100,
            pause_hide_delay_ms: 5000,
            finish_hide_delay_ms: 3000,
            dismiss_delay_ms: 2000,
            audio_reply_delay_ms: 1000,
            backend_timeout_ms: Some(30_000),
        }
    }
}

/// Configuration for the complete chat core
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub reveal: RevealConfig,
    pub timing: TimingConfig,
    pub speech: SpeechOptions,
    pub playback_session: AudioSessionConfig,
    pub recording_session: AudioSessionConfig,

    /// Shown in place of a reply when the backend fails
    pub fallback_text: String,

    /// Reply given to a recorded audio message
    pub audio_reply_text: String,

    /// Text of the user bubble holding a recorded clip
    pub audio_message_label: String,

    pub audio_message_duration_secs: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reveal: RevealConfig::default(),
            timing: TimingConfig::default(),
            speech: SpeechOptions::default(),
            playback_session: AudioSessionConfig::playback(),
            recording_session: AudioSessionConfig::recording(),
            fallback_text: "Desculpe, ocorreu um erro ao processar sua mensagem. Por favor, tente novamente.".to_string(),
            audio_reply_text: "Recebi seu áudio. O que mais posso fazer por você?".to_string(),
            audio_message_label: "🎤 Mensagem de áudio".to_string(),
            audio_message_duration_secs: 15,
        }
    }
}

impl ChatConfig {
    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ChatConfig =
            toml::from_str(content).map_err(|e| ChatError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_speech(mut self, speech: SpeechOptions) -> Self {
        self.speech = speech;
        self
    }

    pub fn with_backend_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.timing.backend_timeout_ms = timeout_ms;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.reveal.step_ms == 0 {
            return Err(ChatError::Config("reveal.step_ms must be positive".into()));
        }
        if self.speech.rate <= 0.0 {
            return Err(ChatError::Config("speech.rate must be positive".into()));
        }
        if self.speech.language.trim().is_empty() {
            return Err(ChatError::Config("speech.language is required".into()));
        }
        if self.timing.backend_timeout_ms == Some(0) {
            return Err(ChatError::Config(
                "timing.backend_timeout_ms must be positive".into(),
            ));
        }
        if !self.recording_session.allows_recording {
            return Err(ChatError::Config(
                "recording_session must allow recording".into(),
            ));
        }
        if self.fallback_text.trim().is_empty() {
            return Err(ChatError::Config("fallback_text is required".into()));
        }
        Ok(())
    }
}
