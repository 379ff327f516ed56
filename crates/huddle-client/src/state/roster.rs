//! Local mirror of who is in the meeting
//!
//! Entries are keyed by participant id and only change through the `apply_*`
//! operations below. Updates may arrive out of order (a media state before the
//! matching join), so every operation tolerates unknown ids.

use huddle_protocol::ParticipantInfo;
use std::collections::HashMap;

/// Name shown for a participant whose join has not been seen yet
pub const PLACEHOLDER_NAME: &str = "Participant";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaState {
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            video_enabled: true,
            audio_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub is_host: bool,
    pub media_state: MediaState,
    pub sharing_screen: bool,
    /// True until a join or listing has supplied the real name
    pub is_placeholder: bool,
}

impl Participant {
    fn new(id: &str, display_name: &str, is_host: bool) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            is_host,
            media_state: MediaState::default(),
            sharing_screen: false,
            is_placeholder: false,
        }
    }

    fn placeholder(id: &str) -> Self {
        Self {
            is_placeholder: true,
            ..Self::new(id, PLACEHOLDER_NAME, false)
        }
    }
}

#[derive(Debug, Default)]
pub struct Roster {
    participants: HashMap<String, Participant>,
    /// Latest count reported by the relay, which includes ourselves
    reported_count: Option<usize>,
    initialized: bool,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load the participants already present when we joined
    ///
    /// Only the first call has an effect. The entry for `host_id` is flagged
    /// as host even if the listing itself omits the flag.
    pub fn apply_existing_participants(&mut self, host_id: Option<&str>, list: &[ParticipantInfo]) {
        if self.initialized {
            tracing::warn!("Ignoring repeated existing_participants listing");
            return;
        }
        self.initialized = true;

        for info in list {
            let is_host = info.is_host || host_id == Some(info.id.as_str());
            self.upsert_identity(&info.id, &info.username, is_host);
        }
        tracing::debug!("Roster initialized with {} participants", self.participants.len());
    }

    pub fn apply_joined(&mut self, id: &str, display_name: &str, is_host: bool) {
        self.upsert_identity(id, display_name, is_host);
    }

    /// Remove a participant; unknown ids are ignored
    pub fn apply_left(&mut self, id: &str) -> Option<Participant> {
        self.participants.remove(id)
    }

    pub fn apply_media_state(&mut self, id: &str, video_enabled: bool, audio_enabled: bool) {
        let entry = self.entry_or_placeholder(id);
        entry.media_state = MediaState {
            video_enabled,
            audio_enabled,
        };
    }

    pub fn apply_screen_share(&mut self, id: &str, sharing: bool) {
        self.entry_or_placeholder(id).sharing_screen = sharing;
    }

    pub fn set_reported_count(&mut self, count: Option<usize>) {
        if count.is_some() {
            self.reported_count = count;
        }
    }

    /// Meeting size including ourselves
    pub fn participant_count(&self) -> usize {
        self.reported_count.unwrap_or(self.participants.len() + 1)
    }

    pub fn resolve_display_name(&self, id: &str) -> &str {
        self.participants
            .get(id)
            .map(|p| p.display_name.as_str())
            .unwrap_or(PLACEHOLDER_NAME)
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants sorted by display name, then id
    pub fn participants(&self) -> Vec<&Participant> {
        let mut list: Vec<&Participant> = self.participants.values().collect();
        list.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    pub fn clear(&mut self) {
        self.participants.clear();
        self.reported_count = None;
        self.initialized = false;
    }

    fn upsert_identity(&mut self, id: &str, display_name: &str, is_host: bool) {
        match self.participants.get_mut(id) {
            Some(existing) => {
                existing.display_name = display_name.to_string();
                existing.is_host = is_host;
                existing.is_placeholder = false;
            }
            None => {
                self.participants
                    .insert(id.to_string(), Participant::new(id, display_name, is_host));
            }
        }
    }

    fn entry_or_placeholder(&mut self, id: &str) -> &mut Participant {
        self.participants.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!("State for unknown participant {}, adding placeholder", id);
            Participant::placeholder(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, name: &str, is_host: bool) -> ParticipantInfo {
        ParticipantInfo {
            id: id.to_string(),
            username: name.to_string(),
            is_host,
        }
    }

    #[test]
    fn test_join_leave_sequence_counts_net_joins() {
        let mut roster = Roster::new();
        roster.apply_joined("a", "Anna", false);
        roster.apply_joined("b", "Boaz", false);
        roster.apply_joined("a", "Anna", false);
        roster.apply_left("b");
        roster.apply_left("b");
        roster.apply_left("zzz");
        roster.apply_joined("c", "Caleb", true);

        assert_eq!(roster.len(), 2);
        assert!(roster.contains("a"));
        assert!(roster.contains("c"));
        assert!(!roster.contains("b"));
    }

    #[test]
    fn test_media_state_for_unknown_id_creates_placeholder() {
        let mut roster = Roster::new();
        roster.apply_media_state("ghost", false, true);

        let entry = roster.get("ghost").unwrap();
        assert!(entry.is_placeholder);
        assert_eq!(roster.resolve_display_name("ghost"), PLACEHOLDER_NAME);
        assert_eq!(
            entry.media_state,
            MediaState {
                video_enabled: false,
                audio_enabled: true
            }
        );

        // The late join fills in the name but keeps the state
        roster.apply_joined("ghost", "Gideon", false);
        let entry = roster.get("ghost").unwrap();
        assert!(!entry.is_placeholder);
        assert_eq!(entry.display_name, "Gideon");
        assert!(!entry.media_state.video_enabled);
    }

    #[test]
    fn test_resolve_unknown_name_never_fails() {
        let roster = Roster::new();
        assert_eq!(roster.resolve_display_name("nobody"), "Participant");
    }

    #[test]
    fn test_existing_participants_applied_once() {
        let mut roster = Roster::new();
        roster.apply_existing_participants(
            Some("h"),
            &[info("h", "Host", false), info("x", "Xena", false)],
        );
        roster.apply_existing_participants(None, &[info("y", "Yael", false)]);

        assert_eq!(roster.len(), 2);
        assert!(roster.get("h").unwrap().is_host);
        assert!(!roster.get("x").unwrap().is_host);
        assert!(!roster.contains("y"));
    }

    #[test]
    fn test_participant_count_prefers_relay_value() {
        let mut roster = Roster::new();
        roster.apply_joined("a", "Anna", false);
        assert_eq!(roster.participant_count(), 2);

        roster.set_reported_count(Some(7));
        roster.set_reported_count(None);
        assert_eq!(roster.participant_count(), 7);
    }

    #[test]
    fn test_screen_share_flag_tracked() {
        let mut roster = Roster::new();
        roster.apply_joined("a", "Anna", false);
        roster.apply_screen_share("a", true);
        assert!(roster.get("a").unwrap().sharing_screen);
        roster.apply_screen_share("a", false);
        assert!(!roster.get("a").unwrap().sharing_screen);
    }
}
