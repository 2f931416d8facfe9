use crate::constants::DEFAULT_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a [`Pedalog`](crate::Pedalog) session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timeout applied to every bulk transfer
    pub timeout_ms: u64,
    /// Bus rescans after a failed read before the device is declared present.
    /// Hosts that report removal late need more than one.
    pub reconnect_attempts: u32,
    /// Pause between rescans
    pub reconnect_delay_ms: u64,
    /// Ask devices for their serial during enumeration
    pub query_serial: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            reconnect_attempts: 1,
            reconnect_delay_ms: 250,
            query_serial: true,
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reconnect(mut self, attempts: u32, delay: Duration) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_query_serial(mut self, query_serial: bool) -> Self {
        self.query_serial = query_serial;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
