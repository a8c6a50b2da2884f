pub mod audio;
pub mod backend;
pub mod integration;
pub mod messages;
pub mod speech;
pub mod testing;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend timed out after {0}ms")]
    BackendTimeout(u64),

    #[error("Speech engine error: {0}")]
    SpeechEngine(String),

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Audio player error: {0}")]
    Player(String),

    #[error("Provisional message {0} has not been promoted yet")]
    ProvisionalInFlight(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    IO(String),
}

impl From<std::io::Error> for ChatError {
    fn from(e: std::io::Error) -> Self {
        ChatError::IO(e.to_string())
    }
}

impl ChatError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user can simply resend
            ChatError::Backend(_) => true,
            ChatError::BackendTimeout(_) => true,
            // Text is still shown when audio fails
            ChatError::SpeechEngine(_) => true,
            // Needs a settings change by the user
            ChatError::PermissionDenied => false,
            ChatError::Recorder(_) => true,
            ChatError::Player(_) => true,
            // Caller bug: the prior session was not torn down
            ChatError::ProvisionalInFlight(_) => false,
            ChatError::Config(_) => false,
            ChatError::Channel(_) => false,
            ChatError::IO(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Backend(_) | ChatError::BackendTimeout(_) => {
                "Desculpe, ocorreu um erro ao processar sua mensagem. Por favor, tente novamente."
                    .to_string()
            }
            ChatError::SpeechEngine(_) => "Não foi possível reproduzir áudio.".to_string(),
            ChatError::PermissionDenied => {
                "Você precisa permitir o acesso ao microfone para enviar mensagens de áudio."
                    .to_string()
            }
            ChatError::Recorder(_) => "Não foi possível gravar o áudio.".to_string(),
            ChatError::Player(_) => "Não foi possível reproduzir a mensagem de áudio.".to_string(),
            ChatError::ProvisionalInFlight(_) => {
                "Uma resposta ainda está sendo reproduzida.".to_string()
            }
            ChatError::Config(_) => "Erro de configuração.".to_string(),
            ChatError::Channel(_) => {
                "Erro interno de comunicação. Reinicie o aplicativo.".to_string()
            }
            ChatError::IO(_) => "Erro no sistema de arquivos.".to_string(),
        }
    }

    /// Title shown above [`user_message`](Self::user_message) in a notice
    pub fn notice_title(&self) -> &'static str {
        match self {
            ChatError::PermissionDenied => "Permissão negada",
            _ => "Erro",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
