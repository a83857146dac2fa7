//! Status enums shared by the wire payloads and the in-memory model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// State of a remote connection as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Connection object exists but no attempt was made yet.
    #[default]
    Init,
    /// Connecting or reconnecting.
    Connecting,
    /// Connection established.
    Connected,
    /// Connection closed.
    Disconnected,
    /// Last connection attempt failed.
    Error,
}

impl ConnectionState {
    /// Returns true if the backend can move from `self` to `next`.
    ///
    /// Valid transitions:
    /// - init → connecting
    /// - connecting → connected | error
    /// - connected → disconnected
    /// - disconnected → connecting
    /// - error → connecting
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Error)
                | (Self::Connected, Self::Disconnected)
                | (Self::Disconnected, Self::Connecting)
                | (Self::Error, Self::Connecting)
        )
    }

    /// Returns the wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            "error" => Ok(Self::Error),
            other => Err(ProtocolError::Deserialization(format!(
                "unknown connection state: {other}"
            ))),
        }
    }
}

/// Coarse lifecycle of the shell process behind a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Not started yet.
    #[default]
    Init,
    /// Process is running.
    Running,
    /// Process exited.
    Done,
}

impl ProcessStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            other => Err(ProtocolError::Deserialization(format!(
                "unknown process status: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use ConnectionState::*;

        assert!(Init.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Error));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Error.can_transition_to(Connecting));
    }

    #[test]
    fn test_invalid_transitions() {
        use ConnectionState::*;

        assert!(!Init.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Error.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_connection_state_wire_names() {
        let json = serde_json::to_string(&ConnectionState::Disconnected).unwrap();
        assert_eq!(json, r#""disconnected""#);

        let state: ConnectionState = serde_json::from_str(r#""connecting""#).unwrap();
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!("error".parse::<ConnectionState>().unwrap(), ConnectionState::Error);
        assert!("bogus".parse::<ConnectionState>().is_err());
    }

    #[test]
    fn test_process_status_wire_names() {
        let status: ProcessStatus = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(status, ProcessStatus::Running);
        assert_eq!(ProcessStatus::Done.to_string(), "done");
        assert_eq!(ProcessStatus::default(), ProcessStatus::Init);
        assert!(serde_json::from_str::<ProcessStatus>(r#""zombie""#).is_err());
    }
}
