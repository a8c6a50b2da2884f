//! Audio session configuration handed to platform collaborators
//!
//! Instead of mutating a global device mode, a collaborator is handed one of
//! these when it acquires a session and applies it only until release.

use serde::Deserialize;

/// How the platform should treat other apps' audio while ours is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionMode {
    MixWithOthers,
    DoNotMix,
    DuckOthers,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AudioSessionConfig {
    pub allows_recording: bool,
    pub plays_in_silent_mode: bool,
    pub stays_active_in_background: bool,
    pub interruption_mode: InterruptionMode,
    pub duck_others: bool,
}

impl AudioSessionConfig {
    /// Speech and message playback
    pub fn playback() -> Self {
        Self {
            allows_recording: false,
            plays_in_silent_mode: true,
            stays_active_in_background: true,
            interruption_mode: InterruptionMode::MixWithOthers,
            duck_others: false,
        }
    }

    /// Microphone capture for audio messages
    pub fn recording() -> Self {
        Self {
            allows_recording: true,
            ..Self::playback()
        }
    }
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self::playback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_differ_only_in_recording() {
        let playback = AudioSessionConfig::playback();
        let recording = AudioSessionConfig::recording();
        assert!(!playback.allows_recording);
        assert!(recording.allows_recording);
        assert_eq!(
            AudioSessionConfig {
                allows_recording: false,
                ..recording
            },
            playback
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AudioSessionConfig =
            toml::from_str("interruption_mode = \"duck_others\"").unwrap();
        assert_eq!(config.interruption_mode, InterruptionMode::DuckOthers);
        assert!(config.plays_in_silent_mode);
    }
}
