mod websocket;

pub use websocket::{Outbound, SignalingClient};

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of a client-generated participant id
const PARTICIPANT_ID_LEN: usize = 9;

/// Random lowercase alphanumeric participant id, chosen by the client before connecting
pub fn generate_participant_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PARTICIPANT_ID_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_shape() {
        let id = generate_participant_id();
        assert_eq!(id.len(), PARTICIPANT_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
