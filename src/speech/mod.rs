//! Speech playback and reveal
//!
//! This module provides:
//! - Duration estimation for pacing the text reveal
//! - The reveal animator
//! - The speech engine seam and the playback controller that drives it

pub mod engine;
pub mod estimator;
pub mod playback;
pub mod reveal;
pub mod simulated;

// Re-export commonly used types
pub use engine::{SpeechEngine, SpeechEvent, SpeechOptions};
pub use estimator::{estimate, estimate_with, RevealConfig, SpeechEstimate};
pub use playback::{
    PlaybackSignal, PlaybackState, SettleCause, SpeechPlaybackController, SpeechSession,
};
pub use reveal::{RevealAnimation, RevealFrame, RevealHandle, TextRevealAnimator};
pub use simulated::SimulatedSpeechEngine;
