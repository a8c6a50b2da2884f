//! Speech duration heuristics used to pace the text reveal

use serde::Deserialize;

/// Minimum reveal duration so short replies do not appear instantly
pub const MIN_DURATION_MS: u64 = 3000;

/// Approximate spoken cadence per character
pub const MS_PER_CHAR: u64 = 65;

/// Reveal tick granularity
pub const STEP_MS: u64 = 50;

/// Pacing parameters for the reveal
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub min_duration_ms: u64,
    pub ms_per_char: u64,
    pub step_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: MIN_DURATION_MS,
            ms_per_char: MS_PER_CHAR,
            step_ms: STEP_MS,
        }
    }
}

/// Estimated playback duration and reveal cadence for a piece of text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeechEstimate {
    pub duration_ms: u64,
    pub step_ms: u64,
}

impl SpeechEstimate {
    /// Number of ticks until the reveal reaches 100%
    pub fn total_steps(&self) -> u64 {
        self.duration_ms.div_ceil(self.step_ms)
    }
}

pub fn estimate(text: &str) -> SpeechEstimate {
    estimate_with(text, &RevealConfig::default())
}

pub fn estimate_with(text: &str, config: &RevealConfig) -> SpeechEstimate {
    let chars = text.chars().count() as u64;
    SpeechEstimate {
        duration_ms: config.min_duration_ms.max(chars * config.ms_per_char),
        step_ms: config.step_ms.max(1),
    }
}
