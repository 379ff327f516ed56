//! Peer lifecycle: one connection instance per remote participant

mod connector;
mod manager;
mod policy;
pub mod rtc;
mod session;

pub use connector::{
    PeerConnector, PeerEvent, PeerEventKind, PeerEventSender, PeerLink, PeerRole, Signal,
};
pub use manager::{PeerManager, PeerNotice, SwapReport};
pub use policy::ReconnectPolicy;
pub use session::{InvalidTransition, PeerSession, PeerState};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("Peer connection closed")]
    Closed,

    #[error("{0}")]
    Backend(String),
}
