//! Domain events delivered to handlers.

use protocol::events::ConnChangeEvent;
use serde::{Deserialize, Serialize};

use crate::state::{ConnectionStatus, ProcessRuntimeStatus};

/// Events that can be routed to handlers scoped by a key.
pub trait ScopedEvent {
    /// Key used to select scoped handlers.
    fn scope_key(&self) -> &str;
}

/// A runtime-status event is the new status itself, scoped by session key.
pub type RuntimeStatusEvent = ProcessRuntimeStatus;

impl ScopedEvent for ProcessRuntimeStatus {
    fn scope_key(&self) -> &str {
        &self.session_key
    }
}

/// Status change of a named connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionChangeEvent {
    pub connection: String,
    pub status: ConnectionStatus,
}

impl ScopedEvent for ConnectionChangeEvent {
    fn scope_key(&self) -> &str {
        &self.connection
    }
}

impl From<ConnChangeEvent> for ConnectionChangeEvent {
    fn from(wire: ConnChangeEvent) -> Self {
        let mut status = ConnectionStatus::from(wire.status);
        if status.connection_name.is_empty() {
            status.connection_name = wire.connection.clone();
        }
        Self {
            connection: wire.connection,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::events::ConnStatus;
    use protocol::status::ConnectionState;

    #[test]
    fn test_conn_change_fills_missing_status_name() {
        let wire = ConnChangeEvent {
            connection: "wsl://Ubuntu".to_string(),
            status: ConnStatus {
                status: ConnectionState::Connecting,
                ..Default::default()
            },
        };

        let event = ConnectionChangeEvent::from(wire);
        assert_eq!(event.scope_key(), "wsl://Ubuntu");
        assert_eq!(event.status.connection_name, "wsl://Ubuntu");
        assert_eq!(event.status.status, ConnectionState::Connecting);
    }

    #[test]
    fn test_runtime_event_scope_is_session_key() {
        let event = ProcessRuntimeStatus::new("s9");
        assert_eq!(event.scope_key(), "s9");
    }
}
