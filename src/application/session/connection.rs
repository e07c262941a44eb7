//! WebSocket connection abstraction

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Role a connection plays, decided by its first valid inbound message:
/// `monitor_init` classifies it as a monitor, any other valid message as a
/// source feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unclassified,
    Source,
    Monitor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => write!(f, "unclassified"),
            Self::Source => write!(f, "source"),
            Self::Monitor => write!(f, "monitor"),
        }
    }
}

/// Represents an active WebSocket connection to the hub
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection instance
    pub connection_id: Uuid,
    /// Current role of the connection
    pub role: Role,
    /// Channel to the connection's writer task
    pub sender: mpsc::UnboundedSender<String>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(connection_id: Uuid, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            connection_id,
            role: Role::Unclassified,
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Send a frame to the connection. Fire-and-forget: the writer task
    /// drains the channel, so this never blocks the caller.
    pub fn send(&self, message: String) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|e| format!("Failed to send message: {}", e))
    }
}

// ── Tests ──────────────────────────────────────────────────────
