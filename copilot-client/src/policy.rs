//! Connection state and the reconnect/heartbeat rules.

use std::time::Duration;

use crate::message::CopilotMessage;

pub const NORMAL_CLOSURE: u16 = 1000;
pub const NO_STATUS_RECEIVED: u16 = 1005;
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Socket lifecycle as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Uninstantiated,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    /// Status line shown to the user.
    pub fn status(self) -> &'static str {
        match self {
            Self::Uninstantiated => "Uninstantiated",
            Self::Connecting => "Connecting...",
            Self::Open => "Connected",
            Self::Closing => "Disconnecting...",
            Self::Closed => "Disconnected",
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Open
    }
}

/// Why a socket went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Closed by the peer or the network with this close code.
    Remote(u16),
    /// The user asked to disconnect.
    UserInitiated,
}

/// Exponential backoff: `min(base * 2^attempt, cap)` for `attempt` in
/// `0..max_attempts`, counted from the last successful open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(10),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Wait before reconnect attempt `attempt`; `None` once attempts are exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.cap))
    }

    /// Normal closure and user disconnects stay closed; anything else reconnects.
    pub fn should_reconnect(&self, close: CloseKind) -> bool {
        match close {
            CloseKind::UserInitiated => false,
            CloseKind::Remote(code) => code != NORMAL_CLOSURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    /// How often a ping is sent.
    pub interval: Duration,
    /// Silence after which the socket is considered dead.
    pub timeout: Duration,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }
}

impl HeartbeatPolicy {
    pub fn ping(&self) -> CopilotMessage {
        CopilotMessage::ping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_cap_then_gives_up() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..10)
            .map(|attempt| policy.delay(attempt).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10, 10, 10, 10, 10]);
        assert_eq!(policy.delay(10), None);
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let policy = ReconnectPolicy {
            max_attempts: 100,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.delay(64), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_only_abnormal_closes_reconnect() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.should_reconnect(CloseKind::Remote(NORMAL_CLOSURE)));
        assert!(!policy.should_reconnect(CloseKind::UserInitiated));
        assert!(policy.should_reconnect(CloseKind::Remote(ABNORMAL_CLOSURE)));
        assert!(policy.should_reconnect(CloseKind::Remote(1011)));
        assert!(policy.should_reconnect(CloseKind::Remote(NO_STATUS_RECEIVED)));
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(ReadyState::default().status(), "Uninstantiated");
        assert_eq!(ReadyState::Connecting.status(), "Connecting...");
        assert_eq!(ReadyState::Open.status(), "Connected");
        assert_eq!(ReadyState::Closing.status(), "Disconnecting...");
        assert_eq!(ReadyState::Closed.status(), "Disconnected");
        assert!(ReadyState::Open.is_connected());
        assert!(!ReadyState::Closing.is_connected());
    }
}
