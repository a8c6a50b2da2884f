//! Integration module for the complete chat flow
//!
//! This module ties the message log, the speech playback controller and the
//! platform collaborators together into a single turn state machine.

pub mod config;
pub mod orchestrator;

pub use config::{ChatConfig, TimingConfig};
pub use orchestrator::{ChatEvent, ChatOrchestrator, ChatView, TurnState};
