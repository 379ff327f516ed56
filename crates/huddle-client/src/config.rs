//! Client configuration
//!
//! Layered from built-in defaults, an optional TOML file and `HUDDLE__*`
//! environment variables, in that order.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::peer::ReconnectPolicy;

const DEFAULT_CONFIG_FILE: &str = "huddle";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the meeting relay (ws:// or wss://)
    pub relay_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub reconnect: ReconnectConfig,
    pub presence: PresenceConfig,
    /// Delay between a host kick and the forced local leave
    pub kick_leave_delay_ms: u64,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub delay_ms: u64,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub poll_interval_ms: u64,
    /// Sampled level a peer must exceed to count as speaking
    pub speech_threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let ice_servers = [
            "stun:stun.l.google.com:19302",
            "stun:stun1.l.google.com:19302",
            "stun:stun2.l.google.com:19302",
            "stun:stun3.l.google.com:19302",
            "stun:stun4.l.google.com:19302",
        ]
        .into_iter()
        .map(|url| IceServerConfig {
            urls: vec![url.to_string()],
            username: None,
            credential: None,
        })
        .collect();

        Self {
            relay_url: "ws://127.0.0.1:8000".to_string(),
            ice_servers,
            reconnect: ReconnectConfig::default(),
            presence: PresenceConfig::default(),
            kick_leave_delay_ms: 2000,
            log_format: LogFormat::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            max_attempts: None,
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            speech_threshold: 30.0,
        }
    }
}

impl ClientConfig {
    /// Load configuration, reading `path` if given or `./huddle.toml` if present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("HUDDLE")
                .separator("__")
                .try_parsing(true),
        );

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!("Loaded configuration: relay {}", config.relay_url);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.relay_url.trim().is_empty() {
            return Err(ClientError::Config("relay_url must not be empty".to_string()));
        }
        if !(self.relay_url.starts_with("ws://") || self.relay_url.starts_with("wss://")) {
            return Err(ClientError::Config(format!(
                "relay_url must use ws:// or wss://, got {}",
                self.relay_url
            )));
        }
        if self.presence.poll_interval_ms == 0 {
            return Err(ClientError::Config(
                "presence.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.presence.speech_threshold < 0.0 {
            return Err(ClientError::Config(
                "presence.speech_threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect.delay_ms),
            self.reconnect.max_attempts,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.presence.poll_interval_ms)
    }

    pub fn kick_leave_delay(&self) -> Duration {
        Duration::from_millis(self.kick_leave_delay_ms)
    }

    /// WebSocket URL for one participant of one meeting
    pub fn meeting_url(&self, meeting_id: &str, participant_id: &str) -> String {
        format!(
            "{}/ws/{}/{}",
            self.relay_url.trim_end_matches('/'),
            urlencoding::encode(meeting_id),
            urlencoding::encode(participant_id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.ice_servers.len(), 5);
        assert_eq!(config.reconnect.delay_ms, 2000);
        assert_eq!(config.reconnect.max_attempts, None);
        assert_eq!(config.presence.poll_interval_ms, 500);
        assert_eq!(config.presence.speech_threshold, 30.0);
        assert_eq!(config.kick_leave_delay(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_meeting_url_is_keyed_by_meeting_and_participant() {
        let config = ClientConfig {
            relay_url: "wss://relay.example.org/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.meeting_url("sunday service", "k3j9x0a1b"),
            "wss://relay.example.org/ws/sunday%20service/k3j9x0a1b"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig {
            relay_url: "http://relay".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.relay_url = "ws://relay".to_string();
        config.presence.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.presence.poll_interval_ms = 500;
        config.presence.speech_threshold = -1.0;
        assert!(config.validate().is_err());
    }
}
