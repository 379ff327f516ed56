//! Shared protocol definitions for Huddle meetings
//!
//! One JSON object per WebSocket frame, discriminated by its `type` field.

pub mod messages;
pub mod types;

pub use messages::{ClientMessage, RelayMessage};
pub use types::{ControlAction, IceCandidateData, ParticipantInfo};
