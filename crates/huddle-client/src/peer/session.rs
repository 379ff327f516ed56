use std::fmt;
use std::sync::Arc;

use super::connector::{PeerLink, PeerRole};
use crate::state::TrackSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// No instance exists for the peer
    Idle,
    Negotiating,
    Connected,
    Reconnecting,
    Closed,
}

impl PeerState {
    pub fn can_transition_to(self, next: PeerState) -> bool {
        use PeerState::*;
        matches!(
            (self, next),
            (Idle, Negotiating)
                | (Negotiating, Connected)
                | (Negotiating, Reconnecting)
                | (Connected, Reconnecting)
                | (Reconnecting, Negotiating)
                | (_, Closed)
        )
    }

    pub fn is_live(self) -> bool {
        matches!(self, PeerState::Negotiating | PeerState::Connected)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::Idle => "idle",
            PeerState::Negotiating => "negotiating",
            PeerState::Connected => "connected",
            PeerState::Reconnecting => "reconnecting",
            PeerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid peer transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: PeerState,
    pub to: PeerState,
}

/// The one live connection instance for a remote participant
pub struct PeerSession {
    pub(super) peer_id: String,
    pub(super) role: PeerRole,
    pub(super) state: PeerState,
    pub(super) source: TrackSource,
    pub(super) retry_count: u32,
    pub(super) generation: u64,
    pub(super) link: Option<Arc<dyn PeerLink>>,
}

impl PeerSession {
    pub(super) fn new(
        peer_id: &str,
        role: PeerRole,
        source: TrackSource,
        generation: u64,
        retry_count: u32,
    ) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            role,
            state: PeerState::Idle,
            source,
            retry_count,
            generation,
            link: None,
        }
    }

    pub(super) fn transition(&mut self, next: PeerState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Peer {} {} -> {}", self.peer_id, self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSession")
            .field("peer_id", &self.peer_id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("source", &self.source)
            .field("retry_count", &self.retry_count)
            .field("generation", &self.generation)
            .field("has_link", &self.link.is_some())
            .finish()
    }
}
