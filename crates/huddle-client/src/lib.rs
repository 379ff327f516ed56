pub mod config;
pub mod control;
pub mod error;
pub mod media;
pub mod network;
pub mod peer;
pub mod presence;
pub mod session;
pub mod state;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::{Session, SessionContext, SessionHandle, SessionUpdate, join};
