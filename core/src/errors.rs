use thiserror::Error;

/// Errors surfaced by the chat engine and its backend client
#[derive(Error, Debug)]
pub enum ChatError {
    /// Transport failure: the request never produced a usable body
    #[error("Network Error: {0}")]
    Network(String),

    /// The backend answered with a non-success status or an unreadable body
    #[error("Protocol Error: {status} - {message}")]
    Protocol { status: u16, message: String },

    /// An `error` event arrived mid-stream, or an event line was not JSON
    #[error("Stream Error: {0}")]
    Stream(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Turn {index} does not exist (conversation has {len} turns)")]
    InvalidTurn { index: usize, len: usize },

    #[error("Unknown {filter} option: {key}")]
    UnknownOption { filter: &'static str, key: String },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Message shown to the user for the failed turn
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Protocol { message, .. } => message.clone(),
            ChatError::Stream(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;
