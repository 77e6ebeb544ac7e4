//! Session configuration

use godice_core::DieType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Shell fitted on the die when the session starts
    #[serde(default)]
    pub die_type: DieType,
    /// Upper bound on battery/color round-trips, enforced on the caller side.
    /// Unset leaves timeouts to the transport.
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
    /// Capacity of the session command queue
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Capacity of the inbound notification queue
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            die_type: DieType::default(),
            response_timeout_ms: None,
            command_buffer: default_command_buffer(),
            notification_buffer: default_notification_buffer(),
        }
    }
}

impl SessionConfig {
    pub fn with_die_type(die_type: DieType) -> Self {
        Self {
            die_type,
            ..Self::default()
        }
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }
}

fn default_command_buffer() -> usize {
    32
}

fn default_notification_buffer() -> usize {
    64
}
