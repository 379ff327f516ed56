use huddle_protocol::ControlAction;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::presence::AudioLevelSource;
use crate::{ClientError, Result};

/// Request from the presentation layer to the session loop
pub enum Command {
    ToggleVideo,
    ToggleAudio,
    StartScreenShare {
        with_audio: bool,
    },
    StopScreenShare,
    SendChat(String),
    SendReaction(String),
    SetChatOpen(bool),
    HostControl {
        target_id: String,
        action: ControlAction,
        reply: oneshot::Sender<Result<()>>,
    },
    RegisterAudioSource {
        participant_id: String,
        source: Arc<dyn AudioLevelSource>,
    },
    UnregisterAudioSource {
        participant_id: String,
    },
    Leave,
}

/// Cloneable handle for driving a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::SessionClosed)
    }

    pub fn toggle_video(&self) -> Result<()> {
        self.send(Command::ToggleVideo)
    }

    pub fn toggle_audio(&self) -> Result<()> {
        self.send(Command::ToggleAudio)
    }

    pub fn start_screen_share(&self, with_audio: bool) -> Result<()> {
        self.send(Command::StartScreenShare { with_audio })
    }

    pub fn stop_screen_share(&self) -> Result<()> {
        self.send(Command::StopScreenShare)
    }

    pub fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::SendChat(text.into()))
    }

    pub fn send_reaction(&self, emoji: impl Into<String>) -> Result<()> {
        self.send(Command::SendReaction(emoji.into()))
    }

    pub fn set_chat_open(&self, open: bool) -> Result<()> {
        self.send(Command::SetChatOpen(open))
    }

    /// Ask the session to issue a host action and wait for the local verdict
    pub async fn host_control(&self, target_id: &str, action: ControlAction) -> Result<()> {
        let (reply, verdict) = oneshot::channel();
        self.send(Command::HostControl {
            target_id: target_id.to_string(),
            action,
            reply,
        })?;
        verdict.await.map_err(|_| ClientError::SessionClosed)?
    }

    pub fn register_audio_source(
        &self,
        participant_id: &str,
        source: Arc<dyn AudioLevelSource>,
    ) -> Result<()> {
        self.send(Command::RegisterAudioSource {
            participant_id: participant_id.to_string(),
            source,
        })
    }

    pub fn unregister_audio_source(&self, participant_id: &str) -> Result<()> {
        self.send(Command::UnregisterAudioSource {
            participant_id: participant_id.to_string(),
        })
    }

    pub fn leave(&self) -> Result<()> {
        self.send(Command::Leave)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
