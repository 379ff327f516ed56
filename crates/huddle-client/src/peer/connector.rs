//! Seam between the lifecycle manager and a concrete peer-connection stack

use async_trait::async_trait;
use huddle_protocol::{ClientMessage, IceCandidateData, RelayMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::PeerError;
use crate::state::TrackSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// We create the offer (the peer was already in the meeting)
    Initiator,
    /// We wait for the peer's offer
    Responder,
}

/// Negotiation payload exchanged through the relay
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate(IceCandidateData),
}

impl Signal {
    /// Wrap for the relay, addressed to `target`
    pub fn into_message(self, target: &str) -> ClientMessage {
        let target = target.to_string();
        match self {
            Signal::Offer { sdp } => ClientMessage::Offer { target, sdp },
            Signal::Answer { sdp } => ClientMessage::Answer { target, sdp },
            Signal::Candidate(candidate) => ClientMessage::IceCandidate { target, candidate },
        }
    }

    /// Split a relay signaling message into sender id and payload
    pub fn from_relay(message: RelayMessage) -> Option<(String, Signal)> {
        match message {
            RelayMessage::Offer { from, sdp } => Some((from, Signal::Offer { sdp })),
            RelayMessage::Answer { from, sdp } => Some((from, Signal::Answer { sdp })),
            RelayMessage::IceCandidate { from, candidate } => {
                Some((from, Signal::Candidate(candidate)))
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer { .. } => "offer",
            Signal::Answer { .. } => "answer",
            Signal::Candidate(_) => "ice-candidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEventKind {
    /// Locally generated negotiation payload to forward to the peer
    Signal(Signal),
    /// An inbound media track arrived
    TrackReceived,
    /// The peer transport failed
    Failed(String),
    /// The peer transport closed on its own
    Closed,
    /// Reconnect backoff elapsed
    ReconnectDue,
}

/// Event from one peer-connection instance, tagged with the instance generation
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEvent {
    pub peer_id: String,
    pub generation: u64,
    pub kind: PeerEventKind,
}

/// Stamps events with the peer id and generation of the instance that owns it
#[derive(Debug, Clone)]
pub struct PeerEventSender {
    peer_id: Arc<str>,
    generation: u64,
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerEventSender {
    pub fn new(peer_id: &str, generation: u64, tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self {
            peer_id: Arc::from(peer_id),
            generation,
            tx,
        }
    }

    pub fn emit(&self, kind: PeerEventKind) {
        let event = PeerEvent {
            peer_id: self.peer_id.to_string(),
            generation: self.generation,
            kind,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!("Peer event for {} dropped, session has ended", self.peer_id);
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Creates peer connections
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Open a connection to `peer_id` sending `source`
    ///
    /// An initiator must emit its offer through `events` once ready.
    async fn open(
        &self,
        peer_id: &str,
        role: PeerRole,
        source: TrackSource,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerLink>, PeerError>;
}

/// One live peer connection
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn apply_signal(&self, signal: Signal) -> Result<(), PeerError>;

    /// Swap the outbound tracks in place, without renegotiating the transport
    async fn replace_source(&self, source: TrackSource) -> Result<(), PeerError>;

    async fn close(&self);
}
