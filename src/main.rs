use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use nutrichat::audio::{SimulatedPlayer, SimulatedRecorder};
use nutrichat::backend::CannedBackend;
use nutrichat::integration::{ChatConfig, ChatEvent, ChatOrchestrator};
use nutrichat::speech::SimulatedSpeechEngine;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TICK: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "nutrichat", about = "Speech-synchronized nutrition assistant chat")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated backend latency
    #[arg(long, default_value_t = 1500)]
    latency_ms: u64,

    /// Only print finished replies, not every reveal step
    #[arg(long)]
    quiet_speech: bool,
}

type DemoChat =
    ChatOrchestrator<SimulatedSpeechEngine, CannedBackend, SimulatedRecorder, SimulatedPlayer>;

/// Drives the orchestrator in wall-clock time from terminal input
struct ChatRuntime {
    chat: DemoChat,
    events: Receiver<ChatEvent>,
    input: Receiver<String>,
    quiet_speech: bool,
}

impl ChatRuntime {
    fn new(config: ChatConfig, latency: Duration, quiet_speech: bool) -> Result<Self> {
        let chat = ChatOrchestrator::new(
            config,
            SimulatedSpeechEngine::new(),
            CannedBackend::new(latency),
            SimulatedRecorder::new(std::env::temp_dir()),
            SimulatedPlayer::new(Duration::from_secs(3)),
        )?;
        let events = chat.events();

        let (input_tx, input) = bounded(16);
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if input_tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            chat,
            events,
            input,
            quiet_speech,
        })
    }

    fn run(mut self) -> Result<()> {
        println!("Digite uma mensagem. Comandos: /pause /record /stop /play <uri> /replay /quit");
        let mut last = Instant::now();

        loop {
            match self.input.recv_timeout(TICK) {
                Ok(line) => {
                    if !self.handle_line(line.trim()) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let now = Instant::now();
            self.chat.advance(now.duration_since(last).as_millis() as u64);
            last = now;
            self.print_events();
        }

        self.chat.unmount();
        self.print_events();
        info!("Chat closed");
        Ok(())
    }

    /// Returns `false` when the user asked to quit
    fn handle_line(&mut self, line: &str) -> bool {
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => return false,
            ("/pause", _) => self.chat.toggle_audio(),
            ("/record", _) => {
                self.chat.start_recording();
            }
            ("/stop", _) => {
                self.chat.stop_recording();
            }
            ("/play", uri) if !uri.is_empty() => {
                self.chat.play_audio(uri.trim());
            }
            ("/replay", _) => {
                let last_reply = self
                    .chat
                    .messages()
                    .visible()
                    .into_iter()
                    .rev()
                    .find(|m| !m.is_user);
                match last_reply {
                    Some(message) => {
                        self.chat.replay_message(message.id);
                    }
                    None => println!("(nenhuma resposta para repetir)"),
                }
            }
            (command, _) if command.starts_with('/') => warn!("Unknown command {}", command),
            _ => {
                self.chat.submit(line);
            }
        }
        true
    }

    fn print_events(&self) {
        for event in self.events.try_iter() {
            match event {
                ChatEvent::MessagesChanged(messages) => {
                    if let Some(message) = messages.last() {
                        let speaker = if message.is_user { "Você" } else { "Assistente" };
                        let status = message
                            .status
                            .map(|s| format!(" [{:?}]", s))
                            .unwrap_or_default();
                        println!("{}: {}{}", speaker, message.text, status);
                    }
                }
                ChatEvent::TypingChanged(true) => println!("(digitando...)"),
                ChatEvent::TypingChanged(false) => {}
                ChatEvent::RevealProgress { progress, text, .. } => {
                    if !self.quiet_speech {
                        println!("  {:>3.0}% {}", progress * 100.0, text);
                    }
                }
                ChatEvent::IndicatorChanged { visible } => {
                    info!("Speaking indicator {}", if visible { "shown" } else { "hidden" })
                }
                ChatEvent::PlaybackChanged { state, muted } => {
                    info!("Playback {:?} (muted: {})", state, muted)
                }
                ChatEvent::Notice { title, body } => println!("!! {}: {}", title, body),
                ChatEvent::RecordingChanged(recording) => {
                    println!("{}", if recording { "(gravando...)" } else { "(gravação encerrada)" })
                }
                ChatEvent::AudioPlaybackChanged { uri } => match uri {
                    Some(uri) => println!("(tocando {})", uri),
                    None => println!("(áudio parado)"),
                },
            }
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutrichat=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ChatConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ChatConfig::default(),
    };

    info!("Starting nutrichat");
    ChatRuntime::new(
        config,
        Duration::from_millis(args.latency_ms),
        args.quiet_speech,
    )?
    .run()
}
