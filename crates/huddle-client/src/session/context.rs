use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::control::ControlPlane;
use crate::presence::ActiveSpeakerDetector;
use crate::state::{ChatLog, HostAuthority, LocalMedia, Roster};

/// Everything one meeting session knows, created on join and dropped on leave
#[derive(Debug)]
pub struct SessionContext {
    pub meeting_id: String,
    pub participant_id: String,
    pub username: String,
    pub started_at: DateTime<Utc>,
    pub roster: Roster,
    pub host: HostAuthority,
    pub media: LocalMedia,
    pub chat: ChatLog,
    pub control: ControlPlane,
    pub speaker: ActiveSpeakerDetector,
}

impl SessionContext {
    pub fn new(meeting_id: &str, participant_id: &str, username: &str, speech_threshold: f32) -> Self {
        Self {
            meeting_id: meeting_id.to_string(),
            participant_id: participant_id.to_string(),
            username: username.to_string(),
            started_at: Utc::now(),
            roster: Roster::new(),
            host: HostAuthority::new(),
            media: LocalMedia::new(),
            chat: ChatLog::default(),
            control: ControlPlane::new(participant_id),
            speaker: ActiveSpeakerDetector::new(speech_threshold),
        }
    }

    /// Time spent in the meeting so far
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }

    /// Meeting timer text, `HH:MM:SS`
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed())
    }

    /// Label used for our own chat lines and reactions
    pub fn own_label(&self) -> String {
        format!("{} (You)", self.username)
    }

    pub fn is_self(&self, id: &str) -> bool {
        id == self.participant_id
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
