//! Orchestrator for the chat screen
//!
//! Connects all components: user input -> backend -> provisional message ->
//! reveal + speech -> promotion. The orchestrator owns every timer and the
//! single speech session slot; collaborators only report back on channels.
//!
//! Time is virtual. A driver calls [`ChatOrchestrator::advance`] with the
//! elapsed milliseconds, due timers fire in deadline order and collaborator
//! channels are drained between them.

use crate::audio::{AudioPlayer, AudioRecorder, PermissionStatus, PlayerEvent, RecordingHandle};
use crate::backend::{BackendReply, ChatBackend};
use crate::integration::config::ChatConfig;
use crate::messages::{Message, MessageId, MessageLog};
use crate::speech::{
    estimate_with, PlaybackSignal, PlaybackState, SettleCause, SpeechEngine,
    SpeechPlaybackController,
};
use crate::utils::{ChatChannels, TimerId, TimerQueue};
use crate::{ChatError, Result};
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where the current turn is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingBackend,
    Speaking,
    Settled,
}

/// Events emitted to the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The visible conversation changed
    MessagesChanged(Vec<Message>),

    TypingChanged(bool),

    /// Reveal stepped; `text` is what the speech bubble should show
    RevealProgress {
        message_id: Option<MessageId>,
        progress: f32,
        text: String,
    },

    /// The speaking indicator was shown or hidden
    IndicatorChanged { visible: bool },

    PlaybackChanged { state: PlaybackState, muted: bool },

    /// A one-shot alert for the user
    Notice { title: String, body: String },

    RecordingChanged(bool),

    /// A recorded clip started or stopped playing
    AudioPlaybackChanged { uri: Option<String> },
}

/// Everything the UI needs to render the chat screen
#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    pub messages: Vec<Message>,
    pub typing: bool,
    pub indicator_visible: bool,
    pub bubble_text: String,
    pub progress: f32,
    pub playback_state: PlaybackState,
    pub muted: bool,
    pub turn_state: TurnState,
    pub recording: bool,
    pub playing_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum ChatTimer {
    Deliver {
        message_id: MessageId,
        text: String,
        turn: u64,
    },
    BackendTimeout {
        request_id: Uuid,
    },
    StartSpeaking {
        message_id: MessageId,
        turn: u64,
    },
    RevealTick,
    HideIndicator,
    AudioDelivered {
        message_id: MessageId,
        turn: u64,
    },
    AudioReply {
        message_id: MessageId,
        turn: u64,
    },
}

/// Backend request of the current turn
#[derive(Debug)]
struct PendingRequest {
    request_id: Uuid,
    user_message_id: MessageId,
    timeout_timer: Option<TimerId>,
}

/// Request of an earlier turn whose reply is no longer wanted
#[derive(Debug)]
struct SupersededRequest {
    user_message_id: MessageId,
    timeout_timer: Option<TimerId>,
}

/// Recorded clip currently loaded in the player
#[derive(Debug, Clone)]
struct PlayingClip {
    playback_id: Uuid,
    uri: String,
}

/// What the current speech session was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeechPurpose {
    Turn,
    AudioReply,
    Replay,
}

pub struct ChatOrchestrator<E, B, R, P>
where
    E: SpeechEngine,
    B: ChatBackend,
    R: AudioRecorder,
    P: AudioPlayer,
{
    config: ChatConfig,
    messages: MessageLog,
    playback: SpeechPlaybackController<E>,
    backend: B,
    recorder: R,
    player: P,
    timers: TimerQueue<ChatTimer>,
    channels: ChatChannels,

    turn_state: TurnState,
    turn: u64,
    pending: Option<PendingRequest>,
    /// Requests of earlier turns, still owed a `read` on their user message
    superseded: HashMap<Uuid, SupersededRequest>,
    speech_purpose: SpeechPurpose,

    typing: bool,
    indicator_visible: bool,
    bubble_text: String,

    speak_timer: Option<TimerId>,
    hide_timer: Option<TimerId>,
    reveal_timer: Option<TimerId>,

    recording: Option<RecordingHandle>,
    playing: Option<PlayingClip>,
    unmounted: bool,
}

impl<E, B, R, P> ChatOrchestrator<E, B, R, P>
where
    E: SpeechEngine,
    B: ChatBackend,
    R: AudioRecorder,
    P: AudioPlayer,
{
    /// Create a new orchestrator with the given configuration and collaborators
    pub fn new(config: ChatConfig, engine: E, backend: B, recorder: R, player: P) -> Result<Self> {
        config.validate()?;
        info!("Creating chat orchestrator");

        let playback = SpeechPlaybackController::new(
            engine,
            config.speech.clone(),
            config.playback_session.clone(),
        );

        Ok(Self {
            config,
            messages: MessageLog::new(),
            playback,
            backend,
            recorder,
            player,
            timers: TimerQueue::new(),
            channels: ChatChannels::new(),
            turn_state: TurnState::Idle,
            turn: 0,
            pending: None,
            superseded: HashMap::new(),
            speech_purpose: SpeechPurpose::Turn,
            typing: false,
            indicator_visible: false,
            bubble_text: String::new(),
            speak_timer: None,
            hide_timer: None,
            reveal_timer: None,
            recording: None,
            playing: None,
            unmounted: false,
        })
    }

    /// Send a text message from the user
    ///
    /// Interrupts whatever the assistant is saying. Returns the appended user
    /// message, or `None` when the text is blank.
    pub fn submit(&mut self, text: &str) -> Option<Message> {
        if self.unmounted {
            debug!("Ignoring submit after unmount");
            return None;
        }
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.barge_in();
        self.turn += 1;

        let message = self.messages.append_user_message(text);
        info!("User message {} submitted (turn {})", message.id, self.turn);
        self.emit_messages();

        self.timers.schedule_once(
            self.config.timing.delivery_delay_ms,
            ChatTimer::Deliver {
                message_id: message.id,
                text: text.to_string(),
                turn: self.turn,
            },
        );
        self.turn_state = TurnState::AwaitingBackend;
        Some(message)
    }

    /// Pause or resume speech, or dismiss the indicator of a finished turn
    pub fn toggle_audio(&mut self) {
        if self.unmounted {
            return;
        }

        match self.playback.state() {
            PlaybackState::Speaking => {
                let signals = self.playback.pause();
                self.handle_signals(signals);
            }
            PlaybackState::Paused => {
                let signals = self.playback.resume();
                self.handle_signals(signals);
            }
            PlaybackState::Finished | PlaybackState::Errored => {
                self.reset_playback();
                self.schedule_hide(self.config.timing.dismiss_delay_ms);
            }
            PlaybackState::Idle => debug!("Nothing to toggle"),
        }
    }

    /// Tear everything down when the chat screen goes away
    ///
    /// Any provisional message is kept as a visible one. Every later call and
    /// every late collaborator event is ignored.
    pub fn unmount(&mut self) {
        if self.unmounted {
            return;
        }
        info!("Unmounting chat");

        self.timers.clear();
        self.speak_timer = None;
        self.hide_timer = None;
        self.reveal_timer = None;

        let mut changed = false;
        if let Some(id) = self.playback.stop() {
            changed |= self.messages.promote(id);
        }
        if let Some(provisional) = self.messages.provisional() {
            changed |= self.messages.promote(provisional.id);
        }
        if changed {
            self.emit_messages();
        }

        self.pending = None;
        self.superseded.clear();

        if let Some(handle) = self.recording.take() {
            if let Err(e) = self.recorder.stop(handle) {
                warn!("Failed to stop recorder on unmount: {}", e);
            }
        }
        if self.playing.take().is_some() {
            self.player.stop();
        }

        self.set_typing(false);
        self.set_indicator(false);
        self.bubble_text.clear();
        self.turn_state = TurnState::Idle;
        self.unmounted = true;
    }

    /// Ask for microphone access and start capturing an audio message
    ///
    /// Returns `true` when recording actually started.
    pub fn start_recording(&mut self) -> bool {
        if self.unmounted || self.recording.is_some() {
            return false;
        }

        if self.recorder.request_permission() == PermissionStatus::Denied {
            self.notice(&ChatError::PermissionDenied);
            return false;
        }

        match self.recorder.start(&self.config.recording_session) {
            Ok(handle) => {
                info!("Recording started");
                self.recording = Some(handle);
                self.emit(ChatEvent::RecordingChanged(true));
                true
            }
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.notice(&e);
                false
            }
        }
    }

    /// Stop capturing and send the clip, if one was produced
    pub fn stop_recording(&mut self) -> Option<Message> {
        let handle = self.recording.take()?;
        self.emit(ChatEvent::RecordingChanged(false));

        match self.recorder.stop(handle) {
            Ok(Some(uri)) => {
                info!("Recording stopped: {}", uri);
                self.send_audio_message(&uri)
            }
            Ok(None) => {
                warn!("Recorder produced no clip");
                None
            }
            Err(e) => {
                error!("Failed to stop recording: {}", e);
                self.notice(&e);
                None
            }
        }
    }

    /// Send a recorded clip as a user message and answer it with the canned audio reply
    pub fn send_audio_message(&mut self, uri: &str) -> Option<Message> {
        if self.unmounted {
            return None;
        }

        self.barge_in();
        self.turn += 1;

        let message = self.messages.append_user_audio_message(
            &self.config.audio_message_label,
            uri,
            self.config.audio_message_duration_secs,
        );
        info!("Audio message {} sent (turn {})", message.id, self.turn);
        self.emit_messages();

        self.timers.schedule_once(
            self.config.timing.delivery_delay_ms,
            ChatTimer::AudioDelivered {
                message_id: message.id,
                turn: self.turn,
            },
        );
        self.turn_state = TurnState::AwaitingBackend;
        Some(message)
    }

    /// Play a recorded clip, or stop it if it is the one already playing
    ///
    /// Returns `true` when the clip is now playing.
    pub fn play_audio(&mut self, uri: &str) -> bool {
        if self.unmounted {
            return false;
        }

        if let Some(playing) = self.playing.take() {
            self.player.stop();
            if playing.uri == uri {
                debug!("Stopped clip {}", uri);
                self.emit(ChatEvent::AudioPlaybackChanged { uri: None });
                return false;
            }
        }

        let playback_id = Uuid::new_v4();
        let started = self
            .player
            .load(
                playback_id,
                uri,
                self.channels.collaborators.player_tx.clone(),
            )
            .and_then(|_| self.player.play());

        match started {
            Ok(()) => {
                info!("Playing clip {} ({})", uri, playback_id);
                self.playing = Some(PlayingClip {
                    playback_id,
                    uri: uri.to_string(),
                });
                self.emit(ChatEvent::AudioPlaybackChanged {
                    uri: Some(uri.to_string()),
                });
                true
            }
            Err(e) => {
                error!("Failed to play clip {}: {}", uri, e);
                self.emit(ChatEvent::AudioPlaybackChanged { uri: None });
                self.notice(&e);
                false
            }
        }
    }

    /// Speak a single assistant message again, without a reveal
    ///
    /// Returns `true` when the engine accepted the utterance.
    pub fn replay_message(&mut self, id: MessageId) -> bool {
        if self.unmounted {
            return false;
        }
        let Some(message) = self.messages.get(id) else {
            return false;
        };
        if message.is_user || message.hidden {
            return false;
        }

        self.stop_speaking();
        info!("Replaying message {}", id);
        self.speech_purpose = SpeechPurpose::Replay;
        let signals = self.playback.speak_adhoc(&message.text);
        self.emit_playback();
        self.handle_signals(signals);
        self.playback.is_active()
    }

    /// Move virtual time forward, firing due timers and applying collaborator events
    pub fn advance(&mut self, elapsed_ms: u64) {
        let until = self.timers.now_ms() + elapsed_ms;
        if self.unmounted {
            self.discard_late_events();
            self.timers.set_now(until);
            return;
        }

        self.drain_channels();
        while let Some((_, timer)) = self.timers.pop_due(until) {
            self.fire(timer);
            self.drain_channels();
            if self.unmounted {
                break;
            }
        }
        self.timers.set_now(until);
    }

    /// Apply collaborator events without moving time
    pub fn poll(&mut self) {
        self.advance(0);
    }

    pub fn snapshot(&self) -> ChatView {
        ChatView {
            messages: self.messages.visible(),
            typing: self.typing,
            indicator_visible: self.indicator_visible,
            bubble_text: self.bubble_text.clone(),
            progress: self.playback.progress(),
            playback_state: self.playback.state(),
            muted: self.playback.is_muted(),
            turn_state: self.turn_state,
            recording: self.recording.is_some(),
            playing_uri: self.playing.as_ref().map(|clip| clip.uri.clone()),
        }
    }

    /// Get a receiver for UI events
    pub fn events(&self) -> Receiver<ChatEvent> {
        self.channels.ui.event_rx.clone()
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn playback(&self) -> &SpeechPlaybackController<E> {
        &self.playback
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    /// Tear down the previous turn before a new user message
    fn barge_in(&mut self) {
        self.stop_speaking();

        // the timeout keeps running so an unanswered request is eventually forgotten
        if let Some(pending) = self.pending.take() {
            debug!("Superseding request {}", pending.request_id);
            self.superseded.insert(
                pending.request_id,
                SupersededRequest {
                    user_message_id: pending.user_message_id,
                    timeout_timer: pending.timeout_timer,
                },
            );
        }
        self.set_typing(false);
    }

    /// Stop speech and the reveal, keeping whatever was being said as a visible message
    fn stop_speaking(&mut self) {
        self.timers.cancel_slot(&mut self.speak_timer);
        self.timers.cancel_slot(&mut self.hide_timer);
        self.timers.cancel_slot(&mut self.reveal_timer);

        let was_active = self.playback.is_active();
        let mut changed = false;
        if let Some(id) = self.playback.stop() {
            changed |= self.messages.promote(id);
        }
        if let Some(provisional) = self.messages.provisional() {
            changed |= self.messages.promote(provisional.id);
        }
        if changed {
            debug!("Promoted interrupted reply");
            self.emit_messages();
        }
        if was_active {
            self.emit_playback();
        }

        self.set_indicator(false);
        self.bubble_text.clear();
    }

    fn fire(&mut self, timer: ChatTimer) {
        match timer {
            ChatTimer::Deliver {
                message_id,
                text,
                turn,
            } => self.on_delivered(message_id, &text, turn),
            ChatTimer::BackendTimeout { request_id } => self.on_backend_timeout(request_id),
            ChatTimer::StartSpeaking { message_id, turn } => {
                self.speak_timer = None;
                self.start_speaking(message_id, turn);
            }
            ChatTimer::RevealTick => {
                let signals = self.playback.advance(self.config.reveal.step_ms.max(1));
                if !self.playback.is_active() {
                    self.timers.cancel_slot(&mut self.reveal_timer);
                }
                self.handle_signals(signals);
            }
            ChatTimer::HideIndicator => {
                self.hide_timer = None;
                self.on_hide_indicator();
            }
            ChatTimer::AudioDelivered { message_id, turn } => {
                if self.messages.mark_delivered(message_id) {
                    self.emit_messages();
                }
                if turn == self.turn {
                    self.timers.schedule_once(
                        self.config.timing.audio_reply_delay_ms,
                        ChatTimer::AudioReply { message_id, turn },
                    );
                }
            }
            ChatTimer::AudioReply { message_id, turn } => self.on_audio_reply(message_id, turn),
        }
    }

    fn on_delivered(&mut self, message_id: MessageId, text: &str, turn: u64) {
        if self.messages.mark_delivered(message_id) {
            self.emit_messages();
        }
        if turn != self.turn {
            debug!("Turn {} superseded before reaching the backend", turn);
            return;
        }

        let request_id = Uuid::new_v4();
        let timeout_timer = self
            .config
            .timing
            .backend_timeout_ms
            .map(|ms| self.timers.schedule_once(ms, ChatTimer::BackendTimeout { request_id }));
        self.pending = Some(PendingRequest {
            request_id,
            user_message_id: message_id,
            timeout_timer,
        });
        self.set_typing(true);

        info!("Sending request {} to backend", request_id);
        self.backend.send_message(
            request_id,
            text,
            self.channels.collaborators.backend_tx.clone(),
        );
    }

    fn on_backend_reply(&mut self, reply: BackendReply) {
        let pending = match self.pending.take() {
            Some(pending) if pending.request_id == reply.request_id => pending,
            other => {
                self.pending = other;
                match self.superseded.remove(&reply.request_id) {
                    Some(superseded) => {
                        debug!("Reply for superseded request {} discarded", reply.request_id);
                        if let Some(timer) = superseded.timeout_timer {
                            self.timers.cancel(timer);
                        }
                        if self.messages.mark_read(superseded.user_message_id) {
                            self.emit_messages();
                        }
                    }
                    None => debug!("Ignoring late reply {}", reply.request_id),
                }
                return;
            }
        };

        if let Some(timer) = pending.timeout_timer {
            self.timers.cancel(timer);
        }
        self.set_typing(false);

        match reply.result {
            Ok(response) => {
                if self.messages.mark_read(pending.user_message_id) {
                    self.emit_messages();
                }
                self.begin_reply(&response);
            }
            Err(e) => {
                warn!("Backend request {} failed: {}", reply.request_id, e);
                self.fail_turn();
            }
        }
    }

    fn on_backend_timeout(&mut self, request_id: Uuid) {
        match self.pending.take() {
            Some(pending) if pending.request_id == request_id => {
                let timeout_ms = self.config.timing.backend_timeout_ms.unwrap_or_default();
                warn!("{}", ChatError::BackendTimeout(timeout_ms));
                self.set_typing(false);
                self.fail_turn();
            }
            other => {
                self.pending = other;
                if self.superseded.remove(&request_id).is_some() {
                    debug!("Superseded request {} timed out", request_id);
                }
            }
        }
    }

    /// Park the reply as a hidden message and start speaking it shortly after
    fn begin_reply(&mut self, response: &str) {
        match self.messages.create_provisional_assistant_message(response) {
            Ok(message) => {
                self.set_indicator(true);
                self.bubble_text.clear();
                self.turn_state = TurnState::Speaking;
                self.speak_timer = Some(self.timers.schedule_once(
                    self.config.timing.speak_delay_ms,
                    ChatTimer::StartSpeaking {
                        message_id: message.id,
                        turn: self.turn,
                    },
                ));
            }
            Err(e) => {
                error!("Cannot stage reply: {}", e);
                self.messages.append_assistant_message(response);
                self.emit_messages();
                self.turn_state = TurnState::Settled;
            }
        }
    }

    fn fail_turn(&mut self) {
        self.messages
            .append_assistant_message(&self.config.fallback_text);
        self.emit_messages();
        self.turn_state = TurnState::Idle;
    }

    fn start_speaking(&mut self, message_id: MessageId, turn: u64) {
        if turn != self.turn {
            return;
        }
        let Some(message) = self.messages.get(message_id) else {
            warn!("Provisional message {} vanished", message_id);
            return;
        };

        let estimate = estimate_with(&message.text, &self.config.reveal);
        debug!(
            "Revealing {} over {}ms",
            message_id, estimate.duration_ms
        );
        self.speech_purpose = SpeechPurpose::Turn;
        let signals = self
            .playback
            .speak(&message.text, Some(message_id), Some(estimate));
        self.start_reveal_ticks();
        self.emit_playback();
        self.handle_signals(signals);
    }

    fn on_audio_reply(&mut self, message_id: MessageId, turn: u64) {
        if self.messages.mark_read(message_id) {
            self.emit_messages();
        }
        if turn != self.turn {
            return;
        }

        let reply = self
            .messages
            .append_assistant_message(&self.config.audio_reply_text);
        self.emit_messages();

        self.set_indicator(true);
        self.bubble_text.clear();
        self.turn_state = TurnState::Speaking;

        let estimate = estimate_with(&reply.text, &self.config.reveal);
        self.speech_purpose = SpeechPurpose::AudioReply;
        let signals = self.playback.speak(&reply.text, None, Some(estimate));
        self.start_reveal_ticks();
        self.emit_playback();
        self.handle_signals(signals);
    }

    fn start_reveal_ticks(&mut self) {
        self.timers.cancel_slot(&mut self.reveal_timer);
        self.reveal_timer = Some(
            self.timers
                .schedule_repeating(self.config.reveal.step_ms.max(1), ChatTimer::RevealTick),
        );
    }

    fn on_hide_indicator(&mut self) {
        debug!("Hiding speaking indicator");
        self.set_indicator(false);
        self.bubble_text.clear();

        // A paused but settled utterance is abandoned with the indicator
        if self.playback.session().is_some_and(|s| s.is_settled()) {
            self.timers.cancel_slot(&mut self.reveal_timer);
            self.playback.stop();
            self.emit_playback();
        } else {
            self.reset_playback();
        }
    }

    /// Leave a finished or failed state for `Idle`
    fn reset_playback(&mut self) {
        if self.playback.reset() {
            self.emit_playback();
        }
    }

    fn handle_signals(&mut self, signals: Vec<PlaybackSignal>) {
        for signal in signals {
            self.handle_signal(signal);
        }
    }

    fn handle_signal(&mut self, signal: PlaybackSignal) {
        match signal {
            PlaybackSignal::Interrupted { target } => {
                if let Some(id) = target {
                    if self.messages.promote(id) {
                        self.emit_messages();
                    }
                }
            }
            PlaybackSignal::Started { .. } => self.emit_playback(),
            PlaybackSignal::RevealProgress {
                target,
                progress,
                revealed_text,
            } => {
                self.bubble_text = revealed_text.clone();
                self.emit(ChatEvent::RevealProgress {
                    message_id: target,
                    progress,
                    text: revealed_text,
                });
            }
            PlaybackSignal::RevealCompleted { .. } => {
                self.timers.cancel_slot(&mut self.reveal_timer);
            }
            PlaybackSignal::Paused { .. } => self.emit_playback(),
            PlaybackSignal::Resumed { .. } => {
                self.timers.cancel_slot(&mut self.hide_timer);
                self.emit_playback();
            }
            PlaybackSignal::Finished { target } => {
                self.finish_utterance(target);
            }
            PlaybackSignal::Errored { target, error } => {
                warn!("Speech failed: {}", error);
                // only an explicit replay tells the user; a turn still shows its text
                if self.speech_purpose == SpeechPurpose::Replay {
                    self.notice(&ChatError::SpeechEngine(error));
                }
                self.finish_utterance(target);
            }
            PlaybackSignal::Settled { target, cause } => {
                info!("Turn settled ({:?})", cause);
                if let Some(id) = target {
                    if self.messages.promote(id) {
                        self.emit_messages();
                    }
                }
                if self.turn_state == TurnState::Speaking {
                    self.turn_state = TurnState::Settled;
                }
                match cause {
                    SettleCause::PausedAfterReveal => {
                        self.schedule_hide(self.config.timing.pause_hide_delay_ms)
                    }
                    SettleCause::RevealedWhilePaused => {
                        self.schedule_hide(self.config.timing.finish_hide_delay_ms)
                    }
                    // the terminal signal already scheduled the hide
                    SettleCause::Finished | SettleCause::Errored => {}
                }
            }
        }
    }

    fn finish_utterance(&mut self, target: Option<MessageId>) {
        self.timers.cancel_slot(&mut self.reveal_timer);
        if let Some(id) = target {
            if self.messages.promote(id) {
                self.emit_messages();
            }
        }
        if self.turn_state == TurnState::Speaking {
            self.turn_state = TurnState::Settled;
        }
        self.emit_playback();
        self.schedule_hide(self.config.timing.finish_hide_delay_ms);
    }

    fn schedule_hide(&mut self, delay_ms: u64) {
        if !self.indicator_visible {
            return;
        }
        self.timers.cancel_slot(&mut self.hide_timer);
        self.hide_timer = Some(self.timers.schedule_once(delay_ms, ChatTimer::HideIndicator));
    }

    fn drain_channels(&mut self) {
        loop {
            let mut progressed = false;

            let signals = self.playback.poll_engine();
            if !signals.is_empty() {
                progressed = true;
                self.handle_signals(signals);
            }

            while let Ok(reply) = self.channels.collaborators.backend_rx.try_recv() {
                progressed = true;
                self.on_backend_reply(reply);
            }

            while let Ok(event) = self.channels.collaborators.player_rx.try_recv() {
                progressed = true;
                self.on_player_event(event);
            }

            if !progressed {
                break;
            }
        }
    }

    fn discard_late_events(&mut self) {
        let engine_events = self.playback.poll_engine().len();
        let replies = self.channels.collaborators.backend_rx.try_iter().count();
        let player_events = self.channels.collaborators.player_rx.try_iter().count();
        if engine_events + replies + player_events > 0 {
            debug!(
                "Discarded {} late events after unmount",
                engine_events + replies + player_events
            );
        }
    }

    fn on_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Finished { playback_id, uri } => {
                let current = self.playing.as_ref().map(|clip| clip.playback_id);
                if current != Some(playback_id) {
                    debug!("Ignoring stale finish of clip {} ({})", uri, playback_id);
                    return;
                }
                debug!("Clip {} finished", uri);
                self.playing = None;
                self.emit(ChatEvent::AudioPlaybackChanged { uri: None });
            }
        }
    }

    fn set_typing(&mut self, typing: bool) {
        if self.typing != typing {
            self.typing = typing;
            self.emit(ChatEvent::TypingChanged(typing));
        }
    }

    fn set_indicator(&mut self, visible: bool) {
        if self.indicator_visible != visible {
            self.indicator_visible = visible;
            self.emit(ChatEvent::IndicatorChanged { visible });
        }
    }

    fn notice(&self, error: &ChatError) {
        warn!("Notice: {}", error);
        self.emit(ChatEvent::Notice {
            title: error.notice_title().to_string(),
            body: error.user_message(),
        });
    }

    fn emit_messages(&self) {
        self.emit(ChatEvent::MessagesChanged(self.messages.visible()));
    }

    fn emit_playback(&self) {
        self.emit(ChatEvent::PlaybackChanged {
            state: self.playback.state(),
            muted: self.playback.is_muted(),
        });
    }

    fn emit(&self, event: ChatEvent) {
        if let Err(e) = self.channels.ui.event_tx.send(event) {
            warn!("Failed to emit chat event: {}", e);
        }
    }
}
