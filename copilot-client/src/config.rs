//! Channel configuration.

use std::time::Duration;

use crate::error::{CopilotError, CopilotResult};
use crate::policy::{HeartbeatPolicy, ReconnectPolicy};

#[derive(Debug, Clone)]
pub struct CopilotConfig {
    /// `ws://` or `wss://` URL of the assistant.
    pub endpoint: String,
    pub reconnect: ReconnectPolicy,
    pub heartbeat: HeartbeatPolicy,
}

impl CopilotConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect: ReconnectPolicy::default(),
            heartbeat: HeartbeatPolicy::default(),
        }
    }

    /// Reads `COPILOT_ENDPOINT` (required) and the optional
    /// `COPILOT_RECONNECT_ATTEMPTS` and `COPILOT_HEARTBEAT_SECS`.
    pub fn load() -> CopilotResult<Self> {
        let endpoint = std::env::var("COPILOT_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CopilotError::Config("COPILOT_ENDPOINT is not set".to_string()))?;
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(CopilotError::Config(format!(
                "COPILOT_ENDPOINT must be a ws:// or wss:// URL, got {endpoint}"
            )));
        }

        let mut config = Self::new(endpoint);
        if let Some(attempts) = env_parse("COPILOT_RECONNECT_ATTEMPTS") {
            config.reconnect.max_attempts = attempts;
        }
        if let Some(secs) = env_parse("COPILOT_HEARTBEAT_SECS") {
            config.heartbeat.interval = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
