use serde::{Deserialize, Serialize};

/// Participant entry as listed by the relay in `existing_participants`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub is_host: bool,
}

/// Host-authority actions carried by `host_control`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    MuteAudio,
    StopVideo,
    Kick,
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlAction::MuteAudio => "mute_audio",
            ControlAction::StopVideo => "stop_video",
            ControlAction::Kick => "kick",
        };
        f.write_str(name)
    }
}

/// Trickle ICE candidate, shaped like the browser's `RTCIceCandidateInit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateData {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

pub(crate) fn default_username() -> String {
    "Anonymous".to_string()
}

pub(crate) fn default_true() -> bool {
    true
}
