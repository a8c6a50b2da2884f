//! Stand-in recorder and player for environments without audio hardware

use super::player::{AudioPlayer, PlayerEvent};
use super::recorder::{AudioRecorder, PermissionStatus, RecordingHandle};
use super::AudioSessionConfig;
use crate::{ChatError, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Pretends to capture audio and hands back a file URI under `dir`
pub struct SimulatedRecorder {
    dir: PathBuf,
    permission: PermissionStatus,
    active: Option<RecordingHandle>,
}

impl SimulatedRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            permission: PermissionStatus::Granted,
            active: None,
        }
    }

    pub fn with_permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }
}

impl AudioRecorder for SimulatedRecorder {
    fn request_permission(&mut self) -> PermissionStatus {
        self.permission
    }

    fn start(&mut self, config: &AudioSessionConfig) -> Result<RecordingHandle> {
        if !config.allows_recording {
            return Err(ChatError::Recorder(
                "Audio session does not allow recording".into(),
            ));
        }
        if self.active.is_some() {
            return Err(ChatError::Recorder("Already recording".into()));
        }
        let handle = RecordingHandle::new();
        self.active = Some(handle);
        info!("Simulated recording {} started", handle.0);
        Ok(handle)
    }

    fn stop(&mut self, handle: RecordingHandle) -> Result<Option<String>> {
        match self.active.take() {
            Some(active) if active == handle => {
                let path = self.dir.join(format!("recording-{}.m4a", handle.0));
                Ok(Some(format!("file://{}", path.display())))
            }
            other => {
                self.active = other;
                Err(ChatError::Recorder("Unknown recording handle".into()))
            }
        }
    }
}

/// Pretends to play a clip for a fixed duration
pub struct SimulatedPlayer {
    clip_duration: Duration,
    loaded: Option<LoadedClip>,
    /// Clip allowed to report its finish; cleared by `stop`
    current: Arc<Mutex<Option<Uuid>>>,
}

#[derive(Clone)]
struct LoadedClip {
    playback_id: Uuid,
    uri: String,
    events: Sender<PlayerEvent>,
}

impl SimulatedPlayer {
    pub fn new(clip_duration: Duration) -> Self {
        Self {
            clip_duration,
            loaded: None,
            current: Arc::new(Mutex::new(None)),
        }
    }
}

impl AudioPlayer for SimulatedPlayer {
    fn load(&mut self, playback_id: Uuid, uri: &str, events: Sender<PlayerEvent>) -> Result<()> {
        debug!("Loading clip {} as {}", uri, playback_id);
        *self.current.lock() = None;
        self.loaded = Some(LoadedClip {
            playback_id,
            uri: uri.to_string(),
            events,
        });
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let clip = self
            .loaded
            .clone()
            .ok_or_else(|| ChatError::Player("Nothing loaded".into()))?;
        *self.current.lock() = Some(clip.playback_id);

        let current = Arc::clone(&self.current);
        let duration = self.clip_duration;
        thread::spawn(move || {
            thread::sleep(duration);
            let mut current = current.lock();
            if *current != Some(clip.playback_id) {
                debug!("Clip {} was stopped, not reporting", clip.playback_id);
                return;
            }
            *current = None;
            let _ = clip.events.send(PlayerEvent::Finished {
                playback_id: clip.playback_id,
                uri: clip.uri,
            });
        });
        Ok(())
    }

    fn stop(&mut self) {
        *self.current.lock() = None;
        self.loaded = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_round_trip() {
        let mut recorder = SimulatedRecorder::new("/tmp");
        let handle = recorder.start(&AudioSessionConfig::recording()).unwrap();
        let uri = recorder.stop(handle).unwrap().unwrap();
        assert!(uri.starts_with("file:///tmp/recording-"));
        assert!(uri.ends_with(".m4a"));
    }

    #[test]
    fn test_recorder_requires_recording_session() {
        let mut recorder = SimulatedRecorder::new("/tmp");
        assert!(recorder.start(&AudioSessionConfig::playback()).is_err());
    }

    #[test]
    fn test_recorder_rejects_unknown_handle() {
        let mut recorder = SimulatedRecorder::new("/tmp");
        let handle = recorder.start(&AudioSessionConfig::recording()).unwrap();
        assert!(recorder.stop(RecordingHandle::new()).is_err());
        assert!(recorder.stop(handle).is_ok());
    }

    #[test]
    fn test_player_requires_load() {
        let mut player = SimulatedPlayer::new(Duration::from_millis(1));
        assert!(player.play().is_err());
    }

    #[test]
    fn test_player_reports_finish() {
        let mut player = SimulatedPlayer::new(Duration::from_millis(5));
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = Uuid::new_v4();
        player.load(id, "file:///clip.m4a", tx).unwrap();
        player.play().unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            PlayerEvent::Finished {
                playback_id: id,
                uri: "file:///clip.m4a".into()
            }
        );
    }

    #[test]
    fn test_stopped_clip_does_not_report() {
        let mut player = SimulatedPlayer::new(Duration::from_millis(50));
        let (tx, rx) = crossbeam_channel::unbounded();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        player.load(first, "file:///clip.m4a", tx.clone()).unwrap();
        player.play().unwrap();
        player.stop();
        player.load(second, "file:///clip.m4a", tx).unwrap();
        player.play().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.playback_id(), second);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
