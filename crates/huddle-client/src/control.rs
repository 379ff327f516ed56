//! Host moderation: outbound authorization and inbound command handling

use huddle_protocol::{ClientMessage, ControlAction};
use thiserror::Error;

use crate::state::{HostAuthority, LocalMedia};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Only the host can {0}")]
    NotHost(ControlAction),

    #[error("Cannot {0} yourself")]
    SelfTarget(ControlAction),

    #[error("Host has not been established yet")]
    HostUnknown,
}

/// What an inbound host command means for the local participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEffect {
    /// Sender did not carry host authority
    Rejected,
    /// Addressed to someone else
    NotForUs,
    /// Already in the requested state, or a kick is already scheduled
    NoOp,
    MuteAudio,
    StopVideo,
    Kick,
}

#[derive(Debug)]
pub struct ControlPlane {
    self_id: String,
    kick_scheduled: bool,
}

impl ControlPlane {
    pub fn new(self_id: &str) -> Self {
        Self {
            self_id: self_id.to_string(),
            kick_scheduled: false,
        }
    }

    /// Build the relay message for a host action, if we hold host authority
    pub fn request(
        &self,
        authority: &HostAuthority,
        target_id: &str,
        action: ControlAction,
    ) -> Result<ClientMessage, ControlError> {
        if !authority.is_established() {
            return Err(ControlError::HostUnknown);
        }
        if !authority.self_is_host() {
            return Err(ControlError::NotHost(action));
        }
        if target_id == self.self_id {
            return Err(ControlError::SelfTarget(action));
        }

        Ok(ClientMessage::HostControl {
            target_id: target_id.to_string(),
            action,
            value: true,
        })
    }

    /// Decide what to do with a host command received from the relay
    ///
    /// A command whose `value` is false (or missing on the wire) asks for nothing.
    pub fn receive(
        &mut self,
        media: &LocalMedia,
        from_host: bool,
        target_id: &str,
        action: ControlAction,
        value: bool,
    ) -> ControlEffect {
        if target_id != self.self_id {
            return ControlEffect::NotForUs;
        }
        if !from_host {
            tracing::warn!("Ignoring {} request without host authority", action);
            return ControlEffect::Rejected;
        }
        if !value {
            tracing::debug!("Ignoring {} request with a false value", action);
            return ControlEffect::NoOp;
        }

        match action {
            ControlAction::MuteAudio if media.audio_enabled() => ControlEffect::MuteAudio,
            ControlAction::StopVideo if media.video_enabled() => ControlEffect::StopVideo,
            ControlAction::Kick if !self.kick_scheduled => {
                self.kick_scheduled = true;
                ControlEffect::Kick
            }
            _ => ControlEffect::NoOp,
        }
    }

    pub fn kick_scheduled(&self) -> bool {
        self.kick_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(self_is_host: bool) -> HostAuthority {
        let mut host = HostAuthority::default();
        let host_id = if self_is_host { "me" } else { "boss" };
        host.establish(Some(host_id.to_string()), self_is_host);
        host
    }

    #[test]
    fn test_non_host_request_is_refused() {
        let plane = ControlPlane::new("me");
        let err = plane
            .request(&authority(false), "p1", ControlAction::Kick)
            .unwrap_err();
        assert_eq!(err, ControlError::NotHost(ControlAction::Kick));
        assert_eq!(err.to_string(), "Only the host can kick");
    }

    #[test]
    fn test_host_request_builds_message() {
        let plane = ControlPlane::new("me");
        let msg = plane
            .request(&authority(true), "p1", ControlAction::MuteAudio)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::HostControl {
                target_id: "p1".into(),
                action: ControlAction::MuteAudio,
                value: true
            }
        );
        assert!(plane.request(&authority(true), "me", ControlAction::Kick).is_err());
        assert_eq!(
            plane.request(&HostAuthority::default(), "p1", ControlAction::Kick),
            Err(ControlError::HostUnknown)
        );
    }

    #[test]
    fn test_inbound_without_authority_is_rejected() {
        let mut plane = ControlPlane::new("me");
        let media = LocalMedia::new();
        assert_eq!(
            plane.receive(&media, false, "me", ControlAction::MuteAudio, true),
            ControlEffect::Rejected
        );
        assert_eq!(
            plane.receive(&media, true, "someone", ControlAction::MuteAudio, true),
            ControlEffect::NotForUs
        );
    }

    #[test]
    fn test_inbound_mute_is_noop_when_already_muted() {
        let mut plane = ControlPlane::new("me");
        let mut media = LocalMedia::new();
        assert_eq!(
            plane.receive(&media, true, "me", ControlAction::MuteAudio, true),
            ControlEffect::MuteAudio
        );
        media.set_audio_enabled(false);
        assert_eq!(
            plane.receive(&media, true, "me", ControlAction::MuteAudio, true),
            ControlEffect::NoOp
        );
    }

    #[test]
    fn test_kick_fires_once() {
        let mut plane = ControlPlane::new("me");
        let media = LocalMedia::new();
        assert_eq!(plane.receive(&media, true, "me", ControlAction::Kick, true), ControlEffect::Kick);
        assert_eq!(plane.receive(&media, true, "me", ControlAction::Kick, true), ControlEffect::NoOp);
        assert!(plane.kick_scheduled());
    }

    #[test]
    fn test_false_value_requests_nothing() {
        let mut plane = ControlPlane::new("me");
        let media = LocalMedia::new();
        for action in [
            ControlAction::MuteAudio,
            ControlAction::StopVideo,
            ControlAction::Kick,
        ] {
            assert_eq!(plane.receive(&media, true, "me", action, false), ControlEffect::NoOp);
        }
        assert!(!plane.kick_scheduled());
        assert_eq!(
            plane.receive(&media, true, "me", ControlAction::Kick, true),
            ControlEffect::Kick
        );
    }
}
