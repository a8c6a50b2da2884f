use crate::audio::PlayerEvent;
use crate::backend::BackendReply;
use crate::integration::ChatEvent;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Inbound channels collaborators answer on
///
/// Unbounded, since senders may run on the orchestrator's own thread.
pub struct CollaboratorChannels {
    pub backend_tx: Sender<BackendReply>,
    pub backend_rx: Receiver<BackendReply>,
    pub player_tx: Sender<PlayerEvent>,
    pub player_rx: Receiver<PlayerEvent>,
}

impl CollaboratorChannels {
    pub fn new() -> Self {
        let (backend_tx, backend_rx) = unbounded();
        let (player_tx, player_rx) = unbounded();

        Self {
            backend_tx,
            backend_rx,
            player_tx,
            player_rx,
        }
    }
}

impl Default for CollaboratorChannels {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound events for the UI layer
pub struct UiChannels {
    pub event_tx: Sender<ChatEvent>,
    pub event_rx: Receiver<ChatEvent>,
}

impl UiChannels {
    pub fn new() -> Self {
        let (event_tx, event_rx) = unbounded();
        Self { event_tx, event_rx }
    }
}

impl Default for UiChannels {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChatChannels {
    pub collaborators: CollaboratorChannels,
    pub ui: UiChannels,
}

impl ChatChannels {
    pub fn new() -> Self {
        Self {
            collaborators: CollaboratorChannels::new(),
            ui: UiChannels::new(),
        }
    }
}

impl Default for ChatChannels {
    fn default() -> Self {
        Self::new()
    }
}
