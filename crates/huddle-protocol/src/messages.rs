use serde::{Deserialize, Serialize};

use crate::types::{ControlAction, IceCandidateData, ParticipantInfo, default_true, default_username};

/// Messages sent from a participant to the meeting relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a fresh connection
    RegisterUsername { username: String },

    /// Chat line broadcast to the whole meeting
    Chat {
        username: String,
        message: String,
        timestamp: String,
    },

    /// Emoji reaction broadcast to the whole meeting
    Reaction { username: String, emoji: String },

    /// Full local media-enable state (level-triggered)
    ParticipantState {
        video_enabled: bool,
        audio_enabled: bool,
    },

    /// Host-only control request, the relay stamps `from_host` when forwarding
    HostControl {
        target_id: String,
        action: ControlAction,
        value: bool,
    },

    /// Screen share started or stopped
    ScreenShare { sharing: bool },

    /// WebRTC offer for one peer
    Offer { target: String, sdp: String },

    /// WebRTC answer for one peer
    Answer { target: String, sdp: String },

    /// Trickle ICE candidate for one peer
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        target: String,
        candidate: IceCandidateData,
    },
}

/// Messages delivered by the meeting relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Sent once to a newly registered participant
    ExistingParticipants {
        #[serde(default)]
        is_host: bool,
        #[serde(default)]
        host_id: Option<String>,
        #[serde(default)]
        participants: Vec<ParticipantInfo>,
    },

    ParticipantJoined {
        participant_id: String,
        #[serde(default = "default_username")]
        username: String,
        #[serde(default)]
        is_host: bool,
        #[serde(default)]
        participant_count: Option<usize>,
    },

    ParticipantLeft {
        participant_id: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        participant_count: Option<usize>,
    },

    Chat {
        #[serde(default)]
        from: Option<String>,
        #[serde(default = "default_username")]
        username: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        timestamp: Option<String>,
    },

    Reaction {
        #[serde(default)]
        from: Option<String>,
        #[serde(default = "default_username")]
        username: String,
        emoji: String,
    },

    ParticipantState {
        from: String,
        #[serde(default = "default_true")]
        video_enabled: bool,
        #[serde(default = "default_true")]
        audio_enabled: bool,
    },

    HostControl {
        #[serde(default)]
        from_host: bool,
        target_id: String,
        action: ControlAction,
        #[serde(default)]
        value: bool,
    },

    ScreenShare {
        #[serde(default)]
        from: Option<String>,
        sharing: bool,
    },

    Offer { from: String, sdp: String },

    Answer { from: String, sdp: String },

    #[serde(rename = "ice-candidate", alias = "candidate")]
    IceCandidate {
        from: String,
        candidate: IceCandidateData,
    },

    /// Any message kind this client does not know about
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of the message kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::RegisterUsername { .. } => "register_username",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Reaction { .. } => "reaction",
            ClientMessage::ParticipantState { .. } => "participant_state",
            ClientMessage::HostControl { .. } => "host_control",
            ClientMessage::ScreenShare { .. } => "screen_share",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::IceCandidate { .. } => "ice-candidate",
        }
    }
}

impl RelayMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the message kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::ExistingParticipants { .. } => "existing_participants",
            RelayMessage::ParticipantJoined { .. } => "participant_joined",
            RelayMessage::ParticipantLeft { .. } => "participant_left",
            RelayMessage::Chat { .. } => "chat",
            RelayMessage::Reaction { .. } => "reaction",
            RelayMessage::ParticipantState { .. } => "participant_state",
            RelayMessage::HostControl { .. } => "host_control",
            RelayMessage::ScreenShare { .. } => "screen_share",
            RelayMessage::Offer { .. } => "offer",
            RelayMessage::Answer { .. } => "answer",
            RelayMessage::IceCandidate { .. } => "ice-candidate",
            RelayMessage::Unknown => "unknown",
        }
    }
}
