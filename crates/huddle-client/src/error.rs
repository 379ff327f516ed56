use thiserror::Error;

use crate::control::ControlError;
use crate::peer::PeerError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signaling transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Local media unavailable: {0}")]
    Media(String),

    #[error("Peer connection error: {0}")]
    Peer(#[from] PeerError),

    #[error("Control request rejected: {0}")]
    Control(#[from] ControlError),

    #[error("Session has ended")]
    SessionClosed,
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl ClientError {
    /// Faults that end the session and warrant a blocking notice
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Media(_) | ClientError::SessionClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
