//! Integration tests for the chat turn lifecycle
//!
//! These tests drive the orchestrator through virtual time with scripted
//! collaborators, so nothing here sleeps or touches real audio.

use crossbeam_channel::Receiver;
use nutrichat::integration::{ChatConfig, ChatEvent, ChatOrchestrator, TurnState};
use nutrichat::messages::{MessageId, MessageStatus};
use nutrichat::speech::{estimate, PlaybackState};
use nutrichat::testing::{
    EngineCall, FakePlayer, FakeRecorder, ManualBackend, PlayerCall, ScriptedSpeechEngine,
};
use nutrichat::ChatError;

const FALLBACK: &str =
    "Desculpe, ocorreu um erro ao processar sua mensagem. Por favor, tente novamente.";
const AUDIO_REPLY: &str = "Recebi seu áudio. O que mais posso fazer por você?";

type TestChat = ChatOrchestrator<ScriptedSpeechEngine, ManualBackend, FakeRecorder, FakePlayer>;

struct Harness {
    chat: TestChat,
    engine: ScriptedSpeechEngine,
    backend: ManualBackend,
    recorder: FakeRecorder,
    player: FakePlayer,
    events: Receiver<ChatEvent>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ChatConfig::default())
    }

    fn with_config(config: ChatConfig) -> Self {
        let engine = ScriptedSpeechEngine::new();
        let backend = ManualBackend::new();
        let recorder = FakeRecorder::new();
        let player = FakePlayer::new();
        let chat = ChatOrchestrator::new(
            config,
            engine.clone(),
            backend.clone(),
            recorder.clone(),
            player.clone(),
        )
        .unwrap();
        let events = chat.events();
        Self {
            chat,
            engine,
            backend,
            recorder,
            player,
            events,
        }
    }

    /// Submit `text`, answer it with the canned backend and start speaking
    ///
    /// Returns the provisional message id and the reply text.
    fn speak_reply_to(&mut self, text: &str) -> (MessageId, String) {
        self.chat.submit(text).unwrap();
        self.chat.advance(1000);
        assert!(self.backend.resolve_next_canned());
        self.chat.poll();
        self.chat.advance(100);

        let provisional = self.chat.messages().provisional().unwrap();
        (provisional.id, provisional.text)
    }

    fn drain(&self) -> Vec<ChatEvent> {
        self.events.try_iter().collect()
    }

    fn visible_texts(&self) -> Vec<String> {
        self.chat
            .messages()
            .visible()
            .into_iter()
            .map(|m| m.text)
            .collect()
    }
}

/// Virtual time from speech start until the reveal reaches 100%
fn full_reveal_ms(text: &str) -> u64 {
    let estimate = estimate(text);
    estimate.total_steps() * estimate.step_ms
}

#[test]
fn test_default_reply_flow() {
    let mut h = Harness::new();
    let user = h.chat.submit("oi").unwrap();
    assert_eq!(user.status, Some(MessageStatus::Sent));

    h.chat.advance(1000);
    let user = h.chat.messages().get(user.id).unwrap();
    assert_eq!(user.status, Some(MessageStatus::Delivered));
    assert!(h.chat.snapshot().typing);

    assert!(h.backend.resolve_next_canned());
    h.chat.poll();
    let view = h.chat.snapshot();
    assert!(!view.typing);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.turn_state, TurnState::Speaking);
    assert_eq!(
        h.chat.messages().get(user.id).unwrap().status,
        Some(MessageStatus::Read)
    );

    h.chat.advance(100);
    let reply = h.chat.messages().provisional().unwrap();
    assert!(reply.text.starts_with("Entendi sua mensagem"));
    assert_eq!(h.engine.spoken(), vec![reply.text.clone()]);

    // fully revealed but still speaking: not promoted yet
    h.chat.advance(full_reveal_ms(&reply.text));
    assert_eq!(h.chat.snapshot().bubble_text, reply.text);
    assert_eq!(h.chat.messages().hidden_count(), 1);

    assert!(h.engine.finish_current());
    h.chat.poll();
    let view = h.chat.snapshot();
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[1].id, reply.id);
    assert_eq!(view.playback_state, PlaybackState::Finished);
    assert_eq!(view.turn_state, TurnState::Settled);
    assert!(view.indicator_visible);

    h.chat.advance(2999);
    assert!(h.chat.snapshot().indicator_visible);
    h.chat.advance(1);
    assert!(!h.chat.snapshot().indicator_visible);

    // every status the UI saw for the user message, in order
    let mut seen: Vec<MessageStatus> = Vec::new();
    for event in h.drain() {
        if let ChatEvent::MessagesChanged(messages) = event {
            let status = messages
                .iter()
                .find(|m| m.id == user.id)
                .and_then(|m| m.status);
            if let Some(status) = status {
                if seen.last() != Some(&status) {
                    seen.push(status);
                }
            }
        }
    }
    assert_eq!(
        seen,
        vec![
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read
        ]
    );
}

#[test]
fn test_diet_keyword_reply() {
    let mut h = Harness::new();
    let (_, text) = h.speak_reply_to("Como está minha DIETA?");
    assert!(text.starts_with("Sua dieta atual"));
    assert_eq!(h.backend.received(), vec!["Como está minha DIETA?".to_string()]);
}

#[test]
fn test_reveal_is_monotonic_prefix() {
    let mut h = Harness::new();
    let (id, text) = h.speak_reply_to("receita");
    h.chat.advance(full_reveal_ms(&text));

    let frames: Vec<(f32, String)> = h
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ChatEvent::RevealProgress {
                message_id,
                progress,
                text,
            } => {
                assert_eq!(message_id, Some(id));
                Some((progress, text))
            }
            _ => None,
        })
        .collect();

    assert_eq!(frames.len() as u64, estimate(&text).total_steps());
    for pair in frames.windows(2) {
        assert!(pair[1].0 >= pair[0].0);
        assert!(pair[1].1.starts_with(&pair[0].1));
        assert!(pair[1].1.chars().count() >= pair[0].1.chars().count());
    }
    let (progress, revealed) = frames.last().unwrap();
    assert_eq!(*progress, 1.0);
    assert_eq!(revealed, &text);
}

#[test]
fn test_short_reply_uses_minimum_duration() {
    let mut config = ChatConfig::default();
    config.reveal.ms_per_char = 1;
    let mut h = Harness::with_config(config);
    let (_, text) = h.speak_reply_to("oi");

    h.chat.advance(2950);
    assert!(h.chat.snapshot().progress < 1.0);
    h.chat.advance(50);
    assert_eq!(h.chat.snapshot().bubble_text, text);
}

#[test]
fn test_pause_after_full_reveal_promotes() {
    let mut h = Harness::new();
    let (id, text) = h.speak_reply_to("água");
    h.chat.advance(full_reveal_ms(&text));
    assert!(h.chat.messages().get(id).unwrap().hidden);

    h.chat.toggle_audio();
    let view = h.chat.snapshot();
    assert_eq!(view.playback_state, PlaybackState::Paused);
    assert!(view.muted);
    assert!(!h.chat.messages().get(id).unwrap().hidden);
    assert!(view.indicator_visible);
    assert!(h.engine.calls().contains(&EngineCall::Pause));

    h.chat.advance(4999);
    assert!(h.chat.snapshot().indicator_visible);
    h.chat.advance(1);
    let view = h.chat.snapshot();
    assert!(!view.indicator_visible);
    assert_eq!(view.playback_state, PlaybackState::Idle);
}

#[test]
fn test_reveal_finishing_while_paused_promotes() {
    let mut h = Harness::new();
    let (id, text) = h.speak_reply_to("proteína");
    h.chat.advance(500);
    h.chat.toggle_audio();
    assert!(h.chat.messages().get(id).unwrap().hidden);

    h.chat.advance(full_reveal_ms(&text) - 500);
    assert!(!h.chat.messages().get(id).unwrap().hidden);
    assert_eq!(h.chat.turn_state(), TurnState::Settled);

    h.chat.advance(2999);
    assert!(h.chat.snapshot().indicator_visible);
    h.chat.advance(1);
    assert!(!h.chat.snapshot().indicator_visible);
}

#[test]
fn test_resume_cancels_pending_hide() {
    let mut h = Harness::new();
    let (_, text) = h.speak_reply_to("peso");
    h.chat.advance(full_reveal_ms(&text));
    h.chat.toggle_audio();
    h.chat.toggle_audio();
    assert_eq!(h.chat.snapshot().playback_state, PlaybackState::Speaking);

    h.chat.advance(6000);
    assert!(h.chat.snapshot().indicator_visible);

    assert!(h.engine.finish_current());
    h.chat.advance(3000);
    assert!(!h.chat.snapshot().indicator_visible);
}

#[test]
fn test_second_message_mid_reveal_barges_in() {
    let mut h = Harness::new();
    let (first, _) = h.speak_reply_to("dieta");
    h.chat.advance(500);
    assert!(h.chat.snapshot().progress < 1.0);

    h.chat.submit("e uma receita?").unwrap();
    let view = h.chat.snapshot();
    assert_eq!(view.messages.len(), 3);
    assert_eq!(view.messages[1].id, first);
    assert_eq!(h.chat.messages().hidden_count(), 0);
    assert!(!view.indicator_visible);
    assert_eq!(view.playback_state, PlaybackState::Idle);
    assert!(h.engine.calls().contains(&EngineCall::Stop));
    assert!(!h.engine.finish_current());

    h.chat.advance(1000);
    assert!(h.backend.resolve_next_canned());
    h.chat.advance(100);
    let second = h.chat.messages().provisional().unwrap();
    assert!(second.text.starts_with("Que tal uma omelete"));
    assert_eq!(h.chat.messages().hidden_count(), 1);
}

#[test]
fn test_barge_in_before_speech_starts() {
    let mut h = Harness::new();
    h.chat.submit("oi").unwrap();
    h.chat.advance(1000);
    h.backend.resolve_next_canned();
    h.chat.poll();
    assert_eq!(h.chat.messages().hidden_count(), 1);

    h.chat.submit("dieta").unwrap();
    assert_eq!(h.chat.messages().hidden_count(), 0);
    h.chat.advance(100);
    assert!(h.engine.spoken().is_empty());
}

#[test]
fn test_backend_failure_shows_fallback() {
    let mut h = Harness::new();
    let user = h.chat.submit("oi").unwrap();
    h.chat.advance(1000);
    assert!(h.backend.reject_next(ChatError::Backend("unreachable".into())));
    h.chat.poll();

    let view = h.chat.snapshot();
    assert!(!view.typing);
    assert_eq!(view.turn_state, TurnState::Idle);
    assert_eq!(h.visible_texts().last().unwrap(), FALLBACK);
    assert_eq!(h.chat.messages().hidden_count(), 0);
    assert_eq!(
        h.chat.messages().get(user.id).unwrap().status,
        Some(MessageStatus::Delivered)
    );

    h.chat.advance(10_000);
    assert!(h.engine.spoken().is_empty());
    assert_eq!(h.backend.received().len(), 1);
}

#[test]
fn test_backend_timeout_shows_fallback_and_ignores_late_reply() {
    let config = ChatConfig::default().with_backend_timeout(Some(5000));
    let mut h = Harness::with_config(config);
    h.chat.submit("oi").unwrap();
    h.chat.advance(1000);

    h.chat.advance(4999);
    assert!(h.chat.snapshot().typing);
    h.chat.advance(1);
    assert!(!h.chat.snapshot().typing);
    assert_eq!(h.visible_texts().last().unwrap(), FALLBACK);

    assert!(h.backend.resolve_next_canned());
    h.chat.advance(1000);
    assert_eq!(h.chat.messages().len(), 2);
    assert!(h.engine.spoken().is_empty());
}

#[test]
fn test_superseded_reply_only_marks_read() {
    let mut h = Harness::new();
    let first = h.chat.submit("dieta").unwrap();
    h.chat.advance(1000);
    h.chat.submit("receita").unwrap();
    assert!(!h.chat.snapshot().typing);

    assert!(h.backend.resolve_next_canned());
    h.chat.poll();
    assert_eq!(
        h.chat.messages().get(first.id).unwrap().status,
        Some(MessageStatus::Read)
    );
    assert_eq!(h.chat.messages().len(), 2);

    h.chat.advance(1000);
    assert_eq!(h.backend.received().len(), 2);
    assert!(h.backend.resolve_next_canned());
    h.chat.advance(100);
    let reply = h.chat.messages().provisional().unwrap();
    assert!(reply.text.starts_with("Que tal uma omelete"));
}

#[test]
fn test_message_superseded_before_delivery_skips_backend() {
    let mut h = Harness::new();
    let first = h.chat.submit("dieta").unwrap();
    h.chat.advance(500);
    h.chat.submit("receita").unwrap();

    h.chat.advance(500);
    assert_eq!(
        h.chat.messages().get(first.id).unwrap().status,
        Some(MessageStatus::Delivered)
    );
    assert!(h.backend.received().is_empty());

    h.chat.advance(500);
    assert_eq!(h.backend.received(), vec!["receita".to_string()]);
}

#[test]
fn test_engine_error_promotes_without_notice() {
    let mut h = Harness::new();
    let (id, text) = h.speak_reply_to("trocar o arroz");
    h.chat.advance(200);
    h.drain();

    assert!(h.engine.fail_current("audio route lost"));
    h.chat.poll();
    let view = h.chat.snapshot();
    assert_eq!(view.playback_state, PlaybackState::Errored);
    assert_eq!(view.bubble_text, text);
    assert!(!h.chat.messages().get(id).unwrap().hidden);
    assert!(!h
        .drain()
        .iter()
        .any(|e| matches!(e, ChatEvent::Notice { .. })));

    h.chat.advance(3000);
    assert!(!h.chat.snapshot().indicator_visible);
}

#[test]
fn test_errored_playback_returns_to_idle() {
    let mut h = Harness::new();
    h.speak_reply_to("oi");
    assert!(h.engine.fail_current("audio route lost"));
    h.chat.poll();
    assert_eq!(h.chat.snapshot().playback_state, PlaybackState::Errored);

    h.chat.toggle_audio();
    assert_eq!(h.chat.snapshot().playback_state, PlaybackState::Idle);
    h.chat.advance(5000);
    let view = h.chat.snapshot();
    assert_eq!(view.playback_state, PlaybackState::Idle);
    assert!(!view.indicator_visible);
}

#[test]
fn test_errored_playback_idle_once_indicator_hides() {
    let mut h = Harness::new();
    h.speak_reply_to("oi");
    h.drain();
    h.engine.fail_current("audio route lost");
    h.chat.advance(3000);

    let view = h.chat.snapshot();
    assert!(!view.indicator_visible);
    assert_eq!(view.playback_state, PlaybackState::Idle);
    assert!(h.drain().iter().any(|e| matches!(
        e,
        ChatEvent::PlaybackChanged {
            state: PlaybackState::Idle,
            ..
        }
    )));
}

#[test]
fn test_rejected_speech_still_promotes() {
    let mut h = Harness::new();
    h.engine.reject_next_speak("no voices installed");
    h.chat.submit("oi").unwrap();
    h.chat.advance(1000);
    h.backend.resolve_next_canned();
    h.chat.advance(100);

    assert_eq!(h.chat.messages().hidden_count(), 0);
    assert_eq!(h.chat.messages().visible().len(), 2);
    assert_eq!(h.chat.snapshot().playback_state, PlaybackState::Errored);
}

#[test]
fn test_toggle_after_finish_dismisses_indicator() {
    let mut h = Harness::new();
    h.speak_reply_to("oi");
    h.engine.finish_current();
    h.chat.poll();
    assert!(h.chat.snapshot().indicator_visible);

    h.chat.toggle_audio();
    h.chat.advance(1999);
    assert!(h.chat.snapshot().indicator_visible);
    h.chat.advance(1);
    assert!(!h.chat.snapshot().indicator_visible);
}

#[test]
fn test_unmount_promotes_and_ignores_everything_after() {
    let mut h = Harness::new();
    let (id, _) = h.speak_reply_to("dieta");
    h.chat.submit("outra pergunta");
    h.chat.advance(1000);
    assert_eq!(h.backend.pending_count(), 1);

    h.chat.unmount();
    assert!(h.chat.is_unmounted());
    assert!(!h.chat.messages().get(id).unwrap().hidden);
    let view = h.chat.snapshot();
    assert!(!view.typing);
    assert!(!view.indicator_visible);
    assert_eq!(view.playback_state, PlaybackState::Idle);
    h.drain();

    h.backend.resolve_next_canned();
    h.chat.advance(60_000);
    assert!(h.chat.submit("olá?").is_none());
    h.chat.toggle_audio();
    assert!(!h.chat.start_recording());

    assert!(h.drain().is_empty());
    assert_eq!(h.chat.messages().hidden_count(), 0);
    assert_eq!(h.chat.messages().len(), 3);
}

#[test]
fn test_recording_permission_denied() {
    let mut h = Harness::new();
    h.recorder.deny_permission();

    assert!(!h.chat.start_recording());
    assert!(!h.chat.snapshot().recording);
    assert!(h.chat.stop_recording().is_none());
    assert!(h.chat.messages().is_empty());

    let notices: Vec<ChatEvent> = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ChatEvent::Notice { .. }))
        .collect();
    assert_eq!(notices.len(), 1);
    assert!(matches!(&notices[0], ChatEvent::Notice { title, .. } if title == "Permissão negada"));
}

#[test]
fn test_recorder_failure_sends_nothing() {
    let mut h = Harness::new();
    h.recorder.fail_next_start("device busy");
    assert!(!h.chat.start_recording());
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, ChatEvent::Notice { title, .. } if title == "Erro")));

    assert!(h.chat.start_recording());
    h.recorder.fail_next_stop("file lost");
    assert!(h.chat.stop_recording().is_none());
    assert!(!h.chat.snapshot().recording);
    assert!(h.chat.messages().is_empty());
}

#[test]
fn test_audio_message_flow() {
    let mut h = Harness::new();
    assert!(h.chat.start_recording());
    assert!(h.chat.snapshot().recording);
    assert!(h.recorder.sessions()[0].allows_recording);

    let message = h.chat.stop_recording().unwrap();
    assert_eq!(message.text, "🎤 Mensagem de áudio");
    let audio = message.audio.clone().unwrap();
    assert_eq!(audio.uri, "file:///fake/clip-1.m4a");
    assert_eq!(audio.duration_secs, 15);
    assert!(h.backend.received().is_empty());

    h.chat.advance(1000);
    assert_eq!(
        h.chat.messages().get(message.id).unwrap().status,
        Some(MessageStatus::Delivered)
    );

    h.chat.advance(1000);
    assert_eq!(
        h.chat.messages().get(message.id).unwrap().status,
        Some(MessageStatus::Read)
    );
    assert_eq!(h.visible_texts().last().unwrap(), AUDIO_REPLY);
    assert_eq!(h.engine.spoken(), vec![AUDIO_REPLY.to_string()]);
    assert!(h.chat.snapshot().indicator_visible);

    h.chat.advance(full_reveal_ms(AUDIO_REPLY));
    assert_eq!(h.chat.snapshot().bubble_text, AUDIO_REPLY);
    h.engine.finish_current();
    h.chat.advance(3000);
    assert!(!h.chat.snapshot().indicator_visible);
    assert_eq!(h.chat.messages().hidden_count(), 0);
    assert!(h.backend.received().is_empty());
}

#[test]
fn test_audio_reply_speech_failure_is_silent() {
    let mut h = Harness::new();
    h.chat.send_audio_message("file:///fake/clip-1.m4a").unwrap();
    h.chat.advance(2000);
    assert_eq!(h.engine.spoken(), vec![AUDIO_REPLY.to_string()]);
    h.drain();

    assert!(h.engine.fail_current("audio route lost"));
    h.chat.poll();
    assert!(!h
        .drain()
        .iter()
        .any(|e| matches!(e, ChatEvent::Notice { .. })));
    assert_eq!(h.visible_texts().last().unwrap(), AUDIO_REPLY);
    assert_eq!(h.chat.snapshot().bubble_text, AUDIO_REPLY);

    h.chat.advance(3000);
    assert!(!h.chat.snapshot().indicator_visible);
}

#[test]
fn test_stale_clip_finish_keeps_replayed_clip_playing() {
    let mut h = Harness::new();
    let uri = "file:///fake/clip-1.m4a";

    assert!(h.chat.play_audio(uri));
    assert!(!h.chat.play_audio(uri));
    assert!(h.chat.play_audio(uri));

    // the first playback reports late, after it was stopped
    assert!(h.player.finish_load(0));
    h.chat.poll();
    assert_eq!(h.chat.snapshot().playing_uri.as_deref(), Some(uri));

    assert!(h.player.finish());
    h.chat.poll();
    assert_eq!(h.chat.snapshot().playing_uri, None);
}

#[test]
fn test_play_audio_toggles() {
    let mut h = Harness::new();
    let uri = "file:///fake/clip-1.m4a";

    assert!(h.chat.play_audio(uri));
    assert_eq!(h.chat.snapshot().playing_uri.as_deref(), Some(uri));

    assert!(!h.chat.play_audio(uri));
    assert_eq!(h.chat.snapshot().playing_uri, None);

    assert!(h.chat.play_audio(uri));
    assert!(h.player.finish());
    h.chat.poll();
    assert_eq!(h.chat.snapshot().playing_uri, None);
    assert_eq!(
        h.player.calls(),
        vec![
            PlayerCall::Load(uri.to_string()),
            PlayerCall::Play,
            PlayerCall::Stop,
            PlayerCall::Load(uri.to_string()),
            PlayerCall::Play,
        ]
    );
}

#[test]
fn test_play_failure_raises_notice() {
    let mut h = Harness::new();
    h.player.fail_next_load("unsupported codec");
    assert!(!h.chat.play_audio("file:///broken.m4a"));
    assert_eq!(h.chat.snapshot().playing_uri, None);
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, ChatEvent::Notice { .. })));
}

#[test]
fn test_replay_message() {
    let mut h = Harness::new();
    let (id, text) = h.speak_reply_to("oi");
    h.engine.finish_current();
    h.chat.advance(3000);

    assert!(h.chat.replay_message(id));
    assert_eq!(h.engine.spoken(), vec![text.clone(), text]);
    assert_eq!(h.chat.snapshot().progress, 1.0);

    let user_id = h.chat.messages().visible()[0].id;
    assert!(!h.chat.replay_message(user_id));
}

#[test]
fn test_replay_failure_raises_notice() {
    let mut h = Harness::new();
    let (id, _) = h.speak_reply_to("oi");
    h.engine.finish_current();
    h.chat.advance(3000);
    h.drain();

    h.engine.reject_next_speak("engine unavailable");
    assert!(!h.chat.replay_message(id));
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, ChatEvent::Notice { title, .. } if title == "Erro")));
}

#[test]
fn test_only_one_hidden_message_across_turns() {
    let mut h = Harness::new();
    for text in ["oi", "dieta", "receita", "água"] {
        h.speak_reply_to(text);
        assert_eq!(h.chat.messages().hidden_count(), 1);
        h.chat.advance(700);
    }
    h.engine.finish_current();
    h.chat.poll();
    assert_eq!(h.chat.messages().hidden_count(), 0);
    assert_eq!(h.chat.messages().visible().len(), 8);
}
