//! Deterministic collaborators for driving the chat core in tests
//!
//! Every fake is a cheap handle onto shared state: keep a clone before handing
//! one to the orchestrator and use it to script replies and inspect calls.

use crate::audio::{
    AudioPlayer, AudioRecorder, AudioSessionConfig, PermissionStatus, PlayerEvent,
    RecordingHandle,
};
use crate::backend::{canned_response, BackendReply, ChatBackend};
use crate::speech::{SpeechEngine, SpeechEvent, SpeechOptions};
use crate::{ChatError, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    AcquireSession,
    Speak { utterance_id: Uuid, text: String },
    Pause,
    Resume,
    Stop,
    ReleaseSession,
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    current: Option<(Uuid, Sender<SpeechEvent>)>,
    last_utterance: Option<Uuid>,
    reject_next_speak: Option<String>,
    fail_next_pause: bool,
}

/// Speech engine that only reports what the test tells it to
///
/// `speak` never emits events on its own; call [`start_current`](Self::start_current),
/// [`finish_current`](Self::finish_current) or [`fail_current`](Self::fail_current).
#[derive(Clone, Default)]
pub struct ScriptedSpeechEngine {
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedSpeechEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    /// Texts passed to `speak`, oldest first
    pub fn spoken(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::Speak { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_utterance(&self) -> Option<Uuid> {
        self.state.lock().last_utterance
    }

    pub fn is_speaking(&self) -> bool {
        self.state.lock().current.is_some()
    }

    pub fn start_current(&self) -> bool {
        let state = self.state.lock();
        match &state.current {
            Some((utterance_id, events)) => events
                .send(SpeechEvent::Started {
                    utterance_id: *utterance_id,
                })
                .is_ok(),
            None => false,
        }
    }

    pub fn finish_current(&self) -> bool {
        match self.state.lock().current.take() {
            Some((utterance_id, events)) => {
                events.send(SpeechEvent::Done { utterance_id }).is_ok()
            }
            None => false,
        }
    }

    pub fn fail_current(&self, error: &str) -> bool {
        match self.state.lock().current.take() {
            Some((utterance_id, events)) => events
                .send(SpeechEvent::Error {
                    utterance_id,
                    error: error.to_string(),
                })
                .is_ok(),
            None => false,
        }
    }

    pub fn reject_next_speak(&self, error: &str) {
        self.state.lock().reject_next_speak = Some(error.to_string());
    }

    pub fn fail_next_pause(&self) {
        self.state.lock().fail_next_pause = true;
    }
}

impl SpeechEngine for ScriptedSpeechEngine {
    fn speak(
        &mut self,
        utterance_id: Uuid,
        text: &str,
        _options: &SpeechOptions,
        events: Sender<SpeechEvent>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::Speak {
            utterance_id,
            text: text.to_string(),
        });
        state.last_utterance = Some(utterance_id);
        if let Some(error) = state.reject_next_speak.take() {
            return Err(ChatError::SpeechEngine(error));
        }
        state.current = Some((utterance_id, events));
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_pause) {
            return Err(ChatError::SpeechEngine("pause refused".into()));
        }
        state.calls.push(EngineCall::Pause);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.state.lock().calls.push(EngineCall::Resume);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::Stop);
        state.current = None;
    }

    fn acquire_session(&mut self, _config: &AudioSessionConfig) -> Result<()> {
        self.state.lock().calls.push(EngineCall::AcquireSession);
        Ok(())
    }

    fn release_session(&mut self) {
        self.state.lock().calls.push(EngineCall::ReleaseSession);
    }
}

struct PendingRequest {
    request_id: Uuid,
    text: String,
    replies: Sender<BackendReply>,
}

#[derive(Default)]
struct BackendState {
    received: Vec<String>,
    pending: Vec<PendingRequest>,
}

/// Backend whose replies are released by hand
#[derive(Clone, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<BackendState>>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every text the backend was asked about, oldest first
    pub fn received(&self) -> Vec<String> {
        self.state.lock().received.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn last_request_id(&self) -> Option<Uuid> {
        self.state.lock().pending.last().map(|p| p.request_id)
    }

    /// Answer the oldest pending request with `response`
    pub fn resolve_next(&self, response: &str) -> bool {
        self.reply_next(|_| Ok(response.to_string()))
    }

    /// Answer the oldest pending request the way the canned backend would
    pub fn resolve_next_canned(&self) -> bool {
        self.reply_next(|text| Ok(canned_response(text).to_string()))
    }

    pub fn reject_next(&self, error: ChatError) -> bool {
        self.reply_next(move |_| Err(error))
    }

    fn reply_next<F>(&self, reply: F) -> bool
    where
        F: FnOnce(&str) -> std::result::Result<String, ChatError>,
    {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            return false;
        }
        let request = state.pending.remove(0);
        let result = reply(&request.text);
        request
            .replies
            .send(BackendReply {
                request_id: request.request_id,
                result,
            })
            .is_ok()
    }
}

impl ChatBackend for ManualBackend {
    fn send_message(&mut self, request_id: Uuid, text: &str, replies: Sender<BackendReply>) {
        let mut state = self.state.lock();
        state.received.push(text.to_string());
        state.pending.push(PendingRequest {
            request_id,
            text: text.to_string(),
            replies,
        });
    }
}

struct RecorderState {
    permission: PermissionStatus,
    permission_requests: usize,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    produce_uri: bool,
    active: Option<RecordingHandle>,
    sessions: Vec<AudioSessionConfig>,
    next_clip: usize,
}

/// Recorder that hands out numbered fake clip URIs
#[derive(Clone)]
pub struct FakeRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState {
                permission: PermissionStatus::Granted,
                permission_requests: 0,
                fail_start: None,
                fail_stop: None,
                produce_uri: true,
                active: None,
                sessions: Vec::new(),
                next_clip: 0,
            })),
        }
    }

    pub fn deny_permission(&self) {
        self.state.lock().permission = PermissionStatus::Denied;
    }

    pub fn fail_next_start(&self, error: &str) {
        self.state.lock().fail_start = Some(error.to_string());
    }

    pub fn fail_next_stop(&self, error: &str) {
        self.state.lock().fail_stop = Some(error.to_string());
    }

    /// Make `stop` return no clip
    pub fn produce_no_uri(&self) {
        self.state.lock().produce_uri = false;
    }

    pub fn permission_requests(&self) -> usize {
        self.state.lock().permission_requests
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Audio sessions the recorder was started with
    pub fn sessions(&self) -> Vec<AudioSessionConfig> {
        self.state.lock().sessions.clone()
    }
}

impl Default for FakeRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioRecorder for FakeRecorder {
    fn request_permission(&mut self) -> PermissionStatus {
        let mut state = self.state.lock();
        state.permission_requests += 1;
        state.permission
    }

    fn start(&mut self, config: &AudioSessionConfig) -> Result<RecordingHandle> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_start.take() {
            return Err(ChatError::Recorder(error));
        }
        state.sessions.push(config.clone());
        let handle = RecordingHandle::new();
        state.active = Some(handle);
        Ok(handle)
    }

    fn stop(&mut self, handle: RecordingHandle) -> Result<Option<String>> {
        let mut state = self.state.lock();
        if state.active != Some(handle) {
            return Err(ChatError::Recorder("unknown recording".into()));
        }
        state.active = None;
        if let Some(error) = state.fail_stop.take() {
            return Err(ChatError::Recorder(error));
        }
        if !state.produce_uri {
            return Ok(None);
        }
        state.next_clip += 1;
        Ok(Some(format!("file:///fake/clip-{}.m4a", state.next_clip)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Load(String),
    Play,
    Stop,
}

#[derive(Clone)]
struct LoadedClip {
    playback_id: Uuid,
    uri: String,
    events: Sender<PlayerEvent>,
}

#[derive(Default)]
struct PlayerState {
    calls: Vec<PlayerCall>,
    loads: Vec<LoadedClip>,
    loaded: Option<LoadedClip>,
    fail_next_load: Option<String>,
}

/// Player that finishes a clip only when told to
#[derive(Clone, Default)]
pub struct FakePlayer {
    state: Arc<Mutex<PlayerState>>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.state.lock().calls.clone()
    }

    pub fn loaded_uri(&self) -> Option<String> {
        self.state.lock().loaded.as_ref().map(|clip| clip.uri.clone())
    }

    pub fn fail_next_load(&self, error: &str) {
        self.state.lock().fail_next_load = Some(error.to_string());
    }

    /// Report the loaded clip as played to the end
    pub fn finish(&self) -> bool {
        match self.state.lock().loaded.take() {
            Some(clip) => send_finished(&clip),
            None => false,
        }
    }

    /// Report the finish of the `index`-th successful load, even if it was stopped since
    pub fn finish_load(&self, index: usize) -> bool {
        match self.state.lock().loads.get(index) {
            Some(clip) => send_finished(clip),
            None => false,
        }
    }
}

fn send_finished(clip: &LoadedClip) -> bool {
    clip.events
        .send(PlayerEvent::Finished {
            playback_id: clip.playback_id,
            uri: clip.uri.clone(),
        })
        .is_ok()
}

impl AudioPlayer for FakePlayer {
    fn load(&mut self, playback_id: Uuid, uri: &str, events: Sender<PlayerEvent>) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(PlayerCall::Load(uri.to_string()));
        if let Some(error) = state.fail_next_load.take() {
            return Err(ChatError::Player(error));
        }
        let clip = LoadedClip {
            playback_id,
            uri: uri.to_string(),
            events,
        };
        state.loads.push(clip.clone());
        state.loaded = Some(clip);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.loaded.is_none() {
            return Err(ChatError::Player("nothing loaded".into()));
        }
        state.calls.push(PlayerCall::Play);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(PlayerCall::Stop);
        state.loaded = None;
    }
}
