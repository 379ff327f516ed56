/// Who holds control-plane authority in this meeting
///
/// Established once from the relay's `existing_participants` message and
/// never re-elected on the client side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAuthority {
    host_id: Option<String>,
    self_is_host: bool,
    established: bool,
}

impl HostAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the relay's host designation; returns false if already established
    pub fn establish(&mut self, host_id: Option<String>, self_is_host: bool) -> bool {
        if self.established {
            tracing::warn!("Host authority already established, ignoring update");
            return false;
        }

        self.host_id = host_id;
        self.self_is_host = self_is_host;
        self.established = true;
        tracing::info!(
            "Host authority established: host {:?}, self is host: {}",
            self.host_id,
            self.self_is_host
        );
        true
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }

    pub fn self_is_host(&self) -> bool {
        self.self_is_host
    }

    pub fn is_established(&self) -> bool {
        self.established
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_is_set_once() {
        let mut authority = HostAuthority::new();
        assert!(!authority.self_is_host());

        assert!(authority.establish(Some("me".to_string()), true));
        assert!(!authority.establish(Some("other".to_string()), false));

        assert_eq!(authority.host_id(), Some("me"));
        assert!(authority.self_is_host());
    }
}
