use huddle_protocol::ClientMessage;

/// Which local capture feeds the outbound video of every peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Camera,
    Screen { with_audio: bool },
}

impl TrackSource {
    pub fn is_screen(&self) -> bool {
        matches!(self, TrackSource::Screen { .. })
    }
}

/// Enable flags and active source of the single local capture
#[derive(Debug, Clone)]
pub struct LocalMedia {
    video_enabled: bool,
    audio_enabled: bool,
    source: TrackSource,
    released: bool,
}

impl Default for LocalMedia {
    fn default() -> Self {
        Self {
            video_enabled: true,
            audio_enabled: true,
            source: TrackSource::Camera,
            released: false,
        }
    }
}

impl LocalMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// Source a peer created right now must be given
    pub fn current_source(&self) -> TrackSource {
        self.source
    }

    pub fn is_sharing_screen(&self) -> bool {
        self.source.is_screen()
    }

    pub fn toggle_video(&mut self) -> bool {
        self.video_enabled = !self.video_enabled;
        self.video_enabled
    }

    pub fn toggle_audio(&mut self) -> bool {
        self.audio_enabled = !self.audio_enabled;
        self.audio_enabled
    }

    /// Returns true if the flag changed
    pub fn set_video_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.video_enabled != enabled;
        self.video_enabled = enabled;
        changed
    }

    /// Returns true if the flag changed
    pub fn set_audio_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.audio_enabled != enabled;
        self.audio_enabled = enabled;
        changed
    }

    /// Switch to the screen source; false if a share is already running
    pub fn start_screen_share(&mut self, with_audio: bool) -> bool {
        if self.source.is_screen() || self.released {
            return false;
        }
        self.source = TrackSource::Screen { with_audio };
        true
    }

    /// Switch back to the camera; false if no share is running
    pub fn stop_screen_share(&mut self) -> bool {
        if !self.source.is_screen() {
            return false;
        }
        self.source = TrackSource::Camera;
        true
    }

    /// Full-state broadcast of the enable flags
    pub fn state_message(&self) -> ClientMessage {
        ClientMessage::ParticipantState {
            video_enabled: self.video_enabled,
            audio_enabled: self.audio_enabled,
        }
    }

    /// Drop the capture for good; returns false if already released
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.source = TrackSource::Camera;
        true
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}
