//! Speech playback controller
//!
//! Drives one utterance at a time through the [`SpeechEngine`] and keeps the
//! text reveal in step with it. Engine events arrive on a channel and are
//! applied by [`SpeechPlaybackController::handle_event`]; everything the
//! caller needs to react to comes back as [`PlaybackSignal`]s.
//!
//! An utterance is settled once both the reveal and the playback agree the
//! turn is over. Playback counts as done when the engine finishes or fails, or
//! when the user has the audio paused while the text is fully revealed.

use super::engine::{SpeechEngine, SpeechEvent, SpeechOptions};
use super::estimator::SpeechEstimate;
use super::reveal::{RevealFrame, TextRevealAnimator};
use crate::audio::AudioSessionConfig;
use crate::messages::MessageId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking,
    Paused,
    Finished,
    Errored,
}

impl PlaybackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Finished | PlaybackState::Errored)
    }
}

/// Why an utterance was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleCause {
    /// Engine completed the utterance
    Finished,
    /// Engine reported a failure
    Errored,
    /// User paused after the text was fully revealed
    PausedAfterReveal,
    /// Reveal reached the end while the user had the audio paused
    RevealedWhilePaused,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSignal {
    /// A previous utterance was torn down to make room for a new one
    Interrupted { target: Option<MessageId> },
    Started { target: Option<MessageId> },
    RevealProgress {
        target: Option<MessageId>,
        progress: f32,
        revealed_text: String,
    },
    RevealCompleted { target: Option<MessageId> },
    Paused { target: Option<MessageId> },
    Resumed { target: Option<MessageId> },
    Finished { target: Option<MessageId> },
    Errored {
        target: Option<MessageId>,
        error: String,
    },
    /// Reveal and playback both consider the turn over. Emitted once per utterance.
    Settled {
        target: Option<MessageId>,
        cause: SettleCause,
    },
}

/// The utterance currently owned by the controller
#[derive(Debug, Clone)]
pub struct SpeechSession {
    pub utterance_id: Uuid,
    pub target: Option<MessageId>,
    pub text: String,
    pub progress: f32,
    pub revealed_text: String,
    pub playback_state: PlaybackState,
    pub muted: bool,
    pub reveal_done: bool,
    pub playback_done: bool,
    settled: bool,
}

impl SpeechSession {
    fn new(target: Option<MessageId>, text: &str, with_reveal: bool) -> Self {
        Self {
            utterance_id: Uuid::new_v4(),
            target,
            text: text.to_string(),
            progress: if with_reveal { 0.0 } else { 1.0 },
            revealed_text: if with_reveal {
                String::new()
            } else {
                text.to_string()
            },
            playback_state: PlaybackState::Speaking,
            muted: false,
            reveal_done: !with_reveal,
            playback_done: false,
            settled: false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Record the settle exactly once when both halves of the join are set
    fn try_settle(&mut self, cause: SettleCause) -> Option<PlaybackSignal> {
        if self.settled || !(self.reveal_done && self.playback_done) {
            return None;
        }
        self.settled = true;
        Some(PlaybackSignal::Settled {
            target: self.target,
            cause,
        })
    }
}

pub struct SpeechPlaybackController<E: SpeechEngine> {
    engine: E,
    options: SpeechOptions,
    audio_session: AudioSessionConfig,
    animator: TextRevealAnimator,
    session: Option<SpeechSession>,
    state: PlaybackState,
    session_acquired: bool,
    events_tx: Sender<SpeechEvent>,
    events_rx: Receiver<SpeechEvent>,
}

impl<E: SpeechEngine> SpeechPlaybackController<E> {
    pub fn new(engine: E, options: SpeechOptions, audio_session: AudioSessionConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            engine,
            options,
            audio_session,
            animator: TextRevealAnimator::new(),
            session: None,
            state: PlaybackState::Idle,
            session_acquired: false,
            events_tx,
            events_rx,
        }
    }

    /// Speak `text`, revealing it at the estimated pace when `reveal` is given
    ///
    /// Any utterance already running is stopped first.
    pub fn speak(
        &mut self,
        text: &str,
        target: Option<MessageId>,
        reveal: Option<SpeechEstimate>,
    ) -> Vec<PlaybackSignal> {
        let mut signals = Vec::new();
        if self.session.is_some() {
            let interrupted = self.stop();
            signals.push(PlaybackSignal::Interrupted {
                target: interrupted,
            });
        }

        if let Some(estimate) = reveal {
            self.animator.start(text, estimate);
        }
        let session = SpeechSession::new(target, text, reveal.is_some());
        let utterance_id = session.utterance_id;
        self.session = Some(session);
        self.state = PlaybackState::Speaking;

        info!(
            "Speaking utterance {} ({} chars, target {:?})",
            utterance_id,
            text.chars().count(),
            target
        );

        match self.engine.acquire_session(&self.audio_session) {
            Ok(()) => self.session_acquired = true,
            Err(e) => warn!("Audio session not acquired: {}", e),
        }

        if let Err(e) = self
            .engine
            .speak(utterance_id, text, &self.options, self.events_tx.clone())
        {
            warn!("Speech engine rejected utterance {}: {}", utterance_id, e);
            signals.extend(self.terminate(PlaybackState::Errored, Some(e.to_string())));
        }
        signals
    }

    /// Speak without a reveal or a target message, e.g. replaying a single message
    pub fn speak_adhoc(&mut self, text: &str) -> Vec<PlaybackSignal> {
        self.speak(text, None, None)
    }

    /// Pause speech. Ignored unless currently speaking.
    pub fn pause(&mut self) -> Vec<PlaybackSignal> {
        if self.state != PlaybackState::Speaking {
            debug!("Pause ignored in state {:?}", self.state);
            return Vec::new();
        }
        if let Err(e) = self.engine.pause() {
            warn!("Speech engine pause failed: {}", e);
            return Vec::new();
        }

        self.state = PlaybackState::Paused;
        let mut signals = Vec::new();
        if let Some(session) = self.session.as_mut() {
            session.playback_state = PlaybackState::Paused;
            session.muted = true;
            signals.push(PlaybackSignal::Paused {
                target: session.target,
            });

            if session.progress >= 1.0 {
                session.playback_done = true;
                signals.extend(session.try_settle(SettleCause::PausedAfterReveal));
            }
        }
        signals
    }

    /// Resume speech. Ignored unless currently paused.
    pub fn resume(&mut self) -> Vec<PlaybackSignal> {
        if self.state != PlaybackState::Paused {
            debug!("Resume ignored in state {:?}", self.state);
            return Vec::new();
        }
        if let Err(e) = self.engine.resume() {
            warn!("Speech engine resume failed: {}", e);
            return Vec::new();
        }

        self.state = PlaybackState::Speaking;
        let mut signals = Vec::new();
        if let Some(session) = self.session.as_mut() {
            session.playback_state = PlaybackState::Speaking;
            session.muted = false;
            signals.push(PlaybackSignal::Resumed {
                target: session.target,
            });
        }
        signals
    }

    /// Stop the engine and drop the session
    ///
    /// Returns the target message of the torn down session, if there was one.
    pub fn stop(&mut self) -> Option<MessageId> {
        self.engine.stop();
        self.animator.cancel();
        self.release_audio_session();
        self.state = PlaybackState::Idle;

        let session = self.session.take()?;
        debug!("Stopped utterance {}", session.utterance_id);
        session.target
    }

    /// Return to `Idle` after a finished or failed utterance
    ///
    /// Returns `true` if the state changed. Does nothing while an utterance is active.
    pub fn reset(&mut self) -> bool {
        if self.session.is_some() || !self.state.is_terminal() {
            return false;
        }
        debug!("Playback reset from {:?}", self.state);
        self.state = PlaybackState::Idle;
        true
    }

    /// Feed elapsed time to the reveal
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<PlaybackSignal> {
        let frames = self.animator.advance(elapsed_ms);
        let mut signals = Vec::new();
        for frame in frames {
            signals.extend(self.apply_frame(frame));
        }
        signals
    }

    /// Drain pending engine events
    pub fn poll_engine(&mut self) -> Vec<PlaybackSignal> {
        let mut signals = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            signals.extend(self.handle_event(event));
        }
        signals
    }

    /// Apply one engine event
    pub fn handle_event(&mut self, event: SpeechEvent) -> Vec<PlaybackSignal> {
        let current = self.session.as_ref().map(|s| s.utterance_id);
        if current != Some(event.utterance_id()) {
            debug!("Ignoring stale speech event {:?}", event);
            return Vec::new();
        }

        match event {
            SpeechEvent::Started { .. } => {
                debug!("Speech started");
                vec![PlaybackSignal::Started {
                    target: self.target(),
                }]
            }
            SpeechEvent::Done { .. } => {
                info!("Speech finished");
                self.terminate(PlaybackState::Finished, None)
            }
            SpeechEvent::Error { error, .. } => {
                warn!("Speech engine reported error: {}", error);
                self.terminate(PlaybackState::Errored, Some(error))
            }
        }
    }

    fn apply_frame(&mut self, frame: RevealFrame) -> Vec<PlaybackSignal> {
        let state = self.state;
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        session.progress = frame.progress;
        session.revealed_text = frame.revealed_text.clone();
        let mut signals = vec![PlaybackSignal::RevealProgress {
            target: session.target,
            progress: frame.progress,
            revealed_text: frame.revealed_text,
        }];

        if frame.complete {
            session.reveal_done = true;
            signals.push(PlaybackSignal::RevealCompleted {
                target: session.target,
            });
            if state == PlaybackState::Paused {
                session.playback_done = true;
                signals.extend(session.try_settle(SettleCause::RevealedWhilePaused));
            }
        }
        signals
    }

    /// Finish or fail the current utterance, forcing the reveal to full text
    fn terminate(&mut self, state: PlaybackState, error: Option<String>) -> Vec<PlaybackSignal> {
        let mut signals = Vec::new();
        if let Some(frame) = self.animator.complete_now() {
            signals.extend(self.apply_frame(frame));
        }

        self.state = state;
        let Some(mut session) = self.session.take() else {
            return signals;
        };

        session.progress = 1.0;
        session.revealed_text = session.text.clone();
        session.reveal_done = true;
        session.playback_done = true;
        session.playback_state = state;
        session.muted = false;

        let cause = match &error {
            Some(error) => {
                signals.push(PlaybackSignal::Errored {
                    target: session.target,
                    error: error.clone(),
                });
                SettleCause::Errored
            }
            None => {
                signals.push(PlaybackSignal::Finished {
                    target: session.target,
                });
                SettleCause::Finished
            }
        };
        signals.extend(session.try_settle(cause));

        self.release_audio_session();
        signals
    }

    fn release_audio_session(&mut self) {
        if self.session_acquired {
            self.engine.release_session();
            self.session_acquired = false;
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn session(&self) -> Option<&SpeechSession> {
        self.session.as_ref()
    }

    pub fn target(&self) -> Option<MessageId> {
        self.session.as_ref().and_then(|s| s.target)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_muted(&self) -> bool {
        self.session.as_ref().map(|s| s.muted).unwrap_or(false)
    }

    /// Reveal progress; 1.0 whenever no utterance is running
    pub fn progress(&self) -> f32 {
        self.session.as_ref().map(|s| s.progress).unwrap_or(1.0)
    }

    pub fn revealed_text(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.revealed_text.as_str())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
