pub mod channels;
pub mod timers;

pub use channels::{ChatChannels, CollaboratorChannels, UiChannels};
pub use timers::{TimerId, TimerQueue};
