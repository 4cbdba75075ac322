//! Install status as reported to pollers.

use serde::{Deserialize, Serialize};

/// Lifecycle of the install worker as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QueueStatus {
    #[default]
    Idle,
    Downloading,
    Installing,
    Complete,
    Failed,
}

impl QueueStatus {
    /// Terminal states are reported once and then cleared.
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Complete | QueueStatus::Failed)
    }

    /// `percent` only carries meaning while work is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, QueueStatus::Downloading | QueueStatus::Installing)
    }
}

/// Point-in-time view of the status register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusSnapshot {
    pub status: QueueStatus,
    pub percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusSnapshot {
    pub fn idle() -> Self {
        Self::default()
    }
}
