//! Wall-clock speech engine that "speaks" by waiting on a worker thread
//!
//! Used by the demo binary where no platform TTS is available. Duration is
//! derived from the text length and the configured rate so pause, resume and
//! stop behave like a real engine.

use super::engine::{SpeechEngine, SpeechEvent, SpeechOptions};
use crate::{ChatError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Spoken milliseconds per character at rate 1.0
const MS_PER_CHAR_AT_RATE_1: f32 = 55.0;

#[derive(Debug)]
enum EngineCommand {
    Speak {
        utterance_id: Uuid,
        duration: Duration,
        events: Sender<SpeechEvent>,
    },
    Pause,
    Resume,
    Stop,
    Shutdown,
}

struct Utterance {
    id: Uuid,
    remaining: Duration,
    resumed_at: Option<Instant>,
    events: Sender<SpeechEvent>,
}

pub struct SimulatedSpeechEngine {
    command_tx: Sender<EngineCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SimulatedSpeechEngine {
    /// Create the engine and start its worker thread
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded(100);
        let worker = thread::spawn(move || run_worker(command_rx));
        Self {
            command_tx,
            worker: Some(worker),
        }
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| ChatError::Channel(format!("Speech worker gone: {}", e)))
    }

    pub fn estimated_duration(text: &str, options: &SpeechOptions) -> Duration {
        let chars = text.chars().count() as f32;
        let ms = chars * MS_PER_CHAR_AT_RATE_1 / options.rate.max(0.1);
        Duration::from_millis(ms as u64)
    }
}

impl Default for SimulatedSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimulatedSpeechEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl SpeechEngine for SimulatedSpeechEngine {
    fn speak(
        &mut self,
        utterance_id: Uuid,
        text: &str,
        options: &SpeechOptions,
        events: Sender<SpeechEvent>,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ChatError::SpeechEngine("Nothing to speak".into()));
        }
        self.send(EngineCommand::Speak {
            utterance_id,
            duration: Self::estimated_duration(text, options),
            events,
        })
    }

    fn pause(&mut self) -> Result<()> {
        self.send(EngineCommand::Pause)
    }

    fn resume(&mut self) -> Result<()> {
        self.send(EngineCommand::Resume)
    }

    fn stop(&mut self) {
        if let Err(e) = self.send(EngineCommand::Stop) {
            error!("Failed to stop speech: {}", e);
        }
    }
}

fn run_worker(command_rx: Receiver<EngineCommand>) {
    info!("Simulated speech worker starting");
    let mut current: Option<Utterance> = None;

    loop {
        let command = match current.as_ref().and_then(time_left) {
            Some(left) => match command_rx.recv_timeout(left) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match command_rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            None => {
                if let Some(utterance) = current.take() {
                    debug!("Utterance {} done", utterance.id);
                    let _ = utterance.events.send(SpeechEvent::Done {
                        utterance_id: utterance.id,
                    });
                }
            }
            Some(EngineCommand::Speak {
                utterance_id,
                duration,
                events,
            }) => {
                let _ = events.send(SpeechEvent::Started { utterance_id });
                current = Some(Utterance {
                    id: utterance_id,
                    remaining: duration,
                    resumed_at: Some(Instant::now()),
                    events,
                });
            }
            Some(EngineCommand::Pause) => {
                if let Some(utterance) = current.as_mut() {
                    if let Some(started) = utterance.resumed_at.take() {
                        utterance.remaining = utterance.remaining.saturating_sub(started.elapsed());
                    }
                }
            }
            Some(EngineCommand::Resume) => {
                if let Some(utterance) = current.as_mut() {
                    utterance.resumed_at.get_or_insert_with(Instant::now);
                }
            }
            Some(EngineCommand::Stop) => {
                current = None;
            }
            Some(EngineCommand::Shutdown) => break,
        }
    }

    info!("Simulated speech worker stopped");
}

/// Remaining time of a playing utterance; `None` while paused
fn time_left(utterance: &Utterance) -> Option<Duration> {
    utterance
        .resumed_at
        .map(|started| utterance.remaining.saturating_sub(started.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_estimated_duration_scales_with_rate() {
        let options = SpeechOptions::default().with_rate(1.0);
        let slow = SpeechOptions::default().with_rate(0.5);
        let fast = SimulatedSpeechEngine::estimated_duration("abcd", &options);
        let slower = SimulatedSpeechEngine::estimated_duration("abcd", &slow);
        assert_eq!(fast, Duration::from_millis(220));
        assert_eq!(slower, Duration::from_millis(440));
    }

    #[test]
    fn test_reports_started_and_done() {
        let mut engine = SimulatedSpeechEngine::new();
        let (tx, rx) = unbounded();
        let id = Uuid::new_v4();
        let options = SpeechOptions::default().with_rate(10.0);

        engine.speak(id, "oi", &options, tx).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            SpeechEvent::Started { utterance_id: id }
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            SpeechEvent::Done { utterance_id: id }
        );
    }

    #[test]
    fn test_stop_suppresses_done() {
        let mut engine = SimulatedSpeechEngine::new();
        let (tx, rx) = unbounded();
        let id = Uuid::new_v4();

        engine
            .speak(id, &"a".repeat(200), &SpeechOptions::default(), tx)
            .unwrap();
        engine.stop();

        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(SpeechEvent::Started { .. })
        ));
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut engine = SimulatedSpeechEngine::new();
        let (tx, _rx) = unbounded();
        assert!(engine
            .speak(Uuid::new_v4(), "  ", &SpeechOptions::default(), tx)
            .is_err());
    }
}
