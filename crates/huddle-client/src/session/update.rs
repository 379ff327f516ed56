use crate::state::{ChatEntry, MediaState, TrackSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Local leave request
    Requested,
    /// Removed by the host
    Kicked,
    /// The relay connection dropped
    TransportLost,
}

/// Presentation effect produced by the session; rendering happens elsewhere
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Relay accepted us and host authority is known
    Joined {
        meeting_id: String,
        participant_id: String,
        self_is_host: bool,
    },
    ParticipantJoined {
        participant_id: String,
        display_name: String,
        participant_count: usize,
    },
    ParticipantLeft {
        participant_id: String,
        display_name: String,
        participant_count: usize,
    },
    /// First inbound media from a peer; attach its view
    StreamAttached {
        peer_id: String,
        display_name: String,
    },
    /// Remove the peer's view
    StreamRemoved { peer_id: String },
    MediaStateChanged {
        participant_id: String,
        state: MediaState,
    },
    ScreenShareChanged {
        participant_id: String,
        sharing: bool,
    },
    LocalMediaChanged {
        video_enabled: bool,
        audio_enabled: bool,
        source: TrackSource,
    },
    ActiveSpeakerChanged {
        previous: Option<String>,
        current: Option<String>,
    },
    ChatReceived(ChatEntry),
    /// Unread chat badge text, `None` when cleared
    UnreadChanged(Option<String>),
    ReactionReceived { username: String, emoji: String },
    /// Transient notices disappear on their own; blocking ones need acknowledgement
    Notice {
        level: NoticeLevel,
        message: String,
        blocking: bool,
    },
    Kicked,
    Left { reason: LeaveReason },
}

impl SessionUpdate {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        SessionUpdate::Notice {
            level,
            message: message.into(),
            blocking: false,
        }
    }

    pub fn blocking(level: NoticeLevel, message: impl Into<String>) -> Self {
        SessionUpdate::Notice {
            level,
            message: message.into(),
            blocking: true,
        }
    }
}
