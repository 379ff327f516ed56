pub mod chat;
pub mod host;
pub mod local_media;
pub mod roster;

pub use chat::{ChatEntry, ChatLog};
pub use host::HostAuthority;
pub use local_media::{LocalMedia, TrackSource};
pub use roster::{MediaState, PLACEHOLDER_NAME, Participant, Roster};
