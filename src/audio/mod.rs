pub mod player;
pub mod recorder;
pub mod session;
pub mod simulated;

pub use player::{AudioPlayer, PlayerEvent};
pub use recorder::{AudioRecorder, PermissionStatus, RecordingHandle};
pub use session::{AudioSessionConfig, InterruptionMode};
pub use simulated::{SimulatedPlayer, SimulatedRecorder};
