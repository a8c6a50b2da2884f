//! Microphone recording seam

use super::AudioSessionConfig;
use crate::Result;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Identifies a recording between `start` and `stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingHandle(pub Uuid);

impl RecordingHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordingHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub trait AudioRecorder {
    fn request_permission(&mut self) -> PermissionStatus;

    /// Begin capturing with the given audio session applied
    fn start(&mut self, config: &AudioSessionConfig) -> Result<RecordingHandle>;

    /// Finish capturing and return the URI of the recorded clip, if one was produced
    fn stop(&mut self, handle: RecordingHandle) -> Result<Option<String>>;
}

impl<R: AudioRecorder + ?Sized> AudioRecorder for Box<R> {
    fn request_permission(&mut self) -> PermissionStatus {
        (**self).request_permission()
    }

    fn start(&mut self, config: &AudioSessionConfig) -> Result<RecordingHandle> {
        (**self).start(config)
    }

    fn stop(&mut self, handle: RecordingHandle) -> Result<Option<String>> {
        (**self).stop(handle)
    }
}
