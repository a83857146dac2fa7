//! Per-session data model.
//!
//! These are the in-memory shapes held by the [`SessionStore`](super::SessionStore)
//! and handed to the presentation layer. They serialize with camelCase field
//! names; the backend wire types in [`protocol::events`] use snake_case and are
//! translated field by field through the `From` impls below.

use protocol::events::{ConnStatus, ControllerStatusEvent};
use serde::{Deserialize, Serialize};

pub use protocol::status::{ConnectionState, ProcessStatus};

/// Unique identifier for a backend session.
pub type SessionKey = String;

/// Identifier of a broadcast scope (tab, workspace).
pub type GroupKey = String;

/// What kind of output a session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Raw terminal byte stream.
    #[default]
    Standard,
    /// Structured embedded UI content.
    EmbeddedUi,
}

/// Health of the connection a session runs over.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub status: ConnectionState,
    pub connected: bool,
    pub connection_name: String,
    /// Once true, stays true for the lifetime of the session record.
    pub has_ever_connected: bool,
    pub active_connection_count: u32,
    pub error: Option<String>,
    pub remote_helper_enabled: bool,
    pub remote_helper_error: Option<String>,
    pub remote_helper_unavailable_reason: Option<String>,
    pub remote_helper_version: Option<String>,
}

impl ConnectionStatus {
    /// Creates an `init` status for the named connection.
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            ..Default::default()
        }
    }

    pub fn set_connecting(&mut self) {
        self.status = ConnectionState::Connecting;
        self.connected = false;
        self.error = None;
    }

    pub fn set_connected(&mut self) {
        self.status = ConnectionState::Connected;
        self.connected = true;
        self.has_ever_connected = true;
        self.error = None;
    }

    pub fn set_disconnected(&mut self) {
        self.status = ConnectionState::Disconnected;
        self.connected = false;
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.status = ConnectionState::Error;
        self.connected = false;
        self.error = Some(error.into());
    }

    /// Enforces `connected => status == Connected`.
    pub fn normalized(mut self) -> Self {
        if self.connected && self.status != ConnectionState::Connected {
            self.connected = false;
        }
        if self.connected {
            self.has_ever_connected = true;
        }
        self
    }

    /// Kind of connection, derived from its name.
    pub fn kind(&self) -> ConnectionKind {
        ConnectionKind::route(&self.connection_name)
    }
}

impl From<ConnStatus> for ConnectionStatus {
    fn from(wire: ConnStatus) -> Self {
        Self {
            status: wire.status,
            connected: wire.connected,
            connection_name: wire.connection,
            has_ever_connected: wire.has_connected,
            active_connection_count: u32::try_from(wire.active_conn_num).unwrap_or(0),
            error: wire.error,
            remote_helper_enabled: wire.wsh_enabled,
            remote_helper_error: wire.wsh_error,
            remote_helper_unavailable_reason: wire.no_wsh_reason,
            remote_helper_version: wire.wsh_version,
        }
        .normalized()
    }
}

/// Transport family of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Local,
    Ssh,
    Wsl,
}

impl ConnectionKind {
    /// Routes a connection name to its kind.
    ///
    /// Empty and `local` names are local; `wsl` and `wsl://...` are WSL;
    /// everything else (`ssh://...`, `user@host`, bare host aliases) is SSH.
    pub fn route(connection_name: &str) -> Self {
        let name = connection_name.trim();
        if name.is_empty() || name == "local" || name.starts_with("local:") {
            Self::Local
        } else if name == "wsl" || name.starts_with("wsl://") {
            Self::Wsl
        } else {
            Self::Ssh
        }
    }
}

/// Per-session display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    pub font_size: f32,
    pub theme_name: String,
}

/// Font size used when no configuration overrides it.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Theme used when no configuration overrides it.
pub const DEFAULT_THEME_NAME: &str = "default-dark";

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            theme_name: DEFAULT_THEME_NAME.to_string(),
        }
    }
}

/// Versioned, backend-authoritative process state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRuntimeStatus {
    pub session_key: SessionKey,
    pub version: i32,
    pub process_status: ProcessStatus,
    pub process_connection_name: Option<String>,
    pub exit_code: i32,
}

impl ProcessRuntimeStatus {
    /// Initial status for a session: version 0, `init`.
    pub fn new(session_key: impl Into<SessionKey>) -> Self {
        Self {
            session_key: session_key.into(),
            version: 0,
            process_status: ProcessStatus::Init,
            process_connection_name: None,
            exit_code: 0,
        }
    }

    pub fn is_init(&self) -> bool {
        self.process_status == ProcessStatus::Init
    }

    pub fn is_running(&self) -> bool {
        self.process_status == ProcessStatus::Running
    }

    pub fn is_done(&self) -> bool {
        self.process_status == ProcessStatus::Done
    }
}

impl From<ControllerStatusEvent> for ProcessRuntimeStatus {
    fn from(wire: ControllerStatusEvent) -> Self {
        Self {
            session_key: wire.block_id,
            version: wire.version,
            process_status: wire.shell_proc_status,
            process_connection_name: wire.shell_proc_conn_name.filter(|name| !name.is_empty()),
            exit_code: wire.shell_proc_exit_code,
        }
    }
}

/// Everything the store knows about one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub mode: SessionMode,
    pub connection_status: ConnectionStatus,
    pub display_config: DisplayConfig,
    pub process_status: ProcessStatus,
    pub runtime_status: ProcessRuntimeStatus,
}

impl SessionRecord {
    /// Default record for `session_key` using the given display defaults.
    pub fn new(session_key: &str, display_config: DisplayConfig) -> Self {
        Self {
            mode: SessionMode::default(),
            connection_status: ConnectionStatus::default(),
            display_config,
            process_status: ProcessStatus::default(),
            runtime_status: ProcessRuntimeStatus::new(session_key),
        }
    }
}

/// Partial update of a [`SessionRecord`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub mode: Option<SessionMode>,
    pub connection_status: Option<ConnectionStatus>,
    pub display_config: Option<DisplayConfig>,
    pub process_status: Option<ProcessStatus>,
    pub runtime_status: Option<ProcessRuntimeStatus>,
}

impl SessionUpdate {
    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_connection_status(mut self, status: ConnectionStatus) -> Self {
        self.connection_status = Some(status);
        self
    }

    pub fn with_display_config(mut self, config: DisplayConfig) -> Self {
        self.display_config = Some(config);
        self
    }

    pub fn with_process_status(mut self, status: ProcessStatus) -> Self {
        self.process_status = Some(status);
        self
    }

    pub fn with_runtime_status(mut self, status: ProcessRuntimeStatus) -> Self {
        self.runtime_status = Some(status);
        self
    }

    /// Returns true if the update carries no field.
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.connection_status.is_none()
            && self.display_config.is_none()
            && self.process_status.is_none()
            && self.runtime_status.is_none()
    }
}

/// Outcome of a runtime-status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeWrite {
    /// The status was stored.
    Applied,
    /// The status carried an older version than the stored one and was dropped.
    Stale { current: i32, incoming: i32 },
}

impl RuntimeWrite {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&SessionMode::EmbeddedUi).unwrap(),
            r#""embedded-ui""#
        );
        assert_eq!(
            serde_json::to_string(&SessionMode::Standard).unwrap(),
            r#""standard""#
        );
    }

    #[test]
    fn test_connection_status_helpers() {
        let mut status = ConnectionStatus::new("user@host");
        assert_eq!(status.status, ConnectionState::Init);

        status.set_connecting();
        assert_eq!(status.status, ConnectionState::Connecting);
        assert!(!status.connected);

        status.set_connected();
        assert!(status.connected);
        assert!(status.has_ever_connected);

        status.set_error("auth failed");
        assert!(!status.connected);
        assert_eq!(status.error.as_deref(), Some("auth failed"));
        assert!(status.has_ever_connected);
    }

    #[test]
    fn test_normalized_clears_inconsistent_connected_flag() {
        let status = ConnectionStatus {
            status: ConnectionState::Disconnected,
            connected: true,
            ..Default::default()
        }
        .normalized();
        assert!(!status.connected);
    }

    #[test]
    fn test_from_wire_conn_status() {
        let wire = ConnStatus {
            status: ConnectionState::Connected,
            connected: true,
            connection: "dev@box".to_string(),
            has_connected: false,
            active_conn_num: 3,
            error: None,
            wsh_enabled: true,
            wsh_error: None,
            no_wsh_reason: Some("disabled by user".to_string()),
            wsh_version: Some("0.9.1".to_string()),
        };

        let status = ConnectionStatus::from(wire);
        assert_eq!(status.connection_name, "dev@box");
        assert_eq!(status.active_connection_count, 3);
        assert!(status.remote_helper_enabled);
        assert_eq!(
            status.remote_helper_unavailable_reason.as_deref(),
            Some("disabled by user")
        );
        assert_eq!(status.remote_helper_version.as_deref(), Some("0.9.1"));
        // connected implies it has connected at least once
        assert!(status.has_ever_connected);
    }

    #[test]
    fn test_negative_active_count_clamps_to_zero() {
        let wire = ConnStatus {
            active_conn_num: -1,
            ..Default::default()
        };
        assert_eq!(ConnectionStatus::from(wire).active_connection_count, 0);
    }

    #[test]
    fn test_connection_kind_routing() {
        assert_eq!(ConnectionKind::route(""), ConnectionKind::Local);
        assert_eq!(ConnectionKind::route("local"), ConnectionKind::Local);
        assert_eq!(ConnectionKind::route("wsl://Ubuntu"), ConnectionKind::Wsl);
        assert_eq!(ConnectionKind::route("wsl"), ConnectionKind::Wsl);
        assert_eq!(ConnectionKind::route("user@host"), ConnectionKind::Ssh);
        assert_eq!(ConnectionKind::route("ssh://user@host:22"), ConnectionKind::Ssh);
        assert_eq!(ConnectionKind::route("devbox"), ConnectionKind::Ssh);
    }

    #[test]
    fn test_runtime_status_from_wire() {
        let wire = ControllerStatusEvent {
            block_id: "s1".to_string(),
            version: 5,
            shell_proc_status: ProcessStatus::Running,
            shell_proc_conn_name: Some(String::new()),
            shell_proc_exit_code: 0,
        };

        let status = ProcessRuntimeStatus::from(wire);
        assert_eq!(status.session_key, "s1");
        assert_eq!(status.version, 5);
        assert!(status.is_running());
        assert_eq!(status.process_connection_name, None);
    }

    #[test]
    fn test_session_record_defaults() {
        let record = SessionRecord::new("s1", DisplayConfig::default());
        assert_eq!(record.mode, SessionMode::Standard);
        assert_eq!(record.process_status, ProcessStatus::Init);
        assert!(record.runtime_status.is_init());
        assert_eq!(record.runtime_status.session_key, "s1");
        assert_eq!(record.display_config.font_size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn test_view_fields_serialize_camel_case() {
        let json = serde_json::to_value(ConnectionStatus::new("h")).unwrap();
        assert!(json.get("hasEverConnected").is_some());
        assert!(json.get("activeConnectionCount").is_some());
        assert!(json.get("has_connected").is_none());
    }

    #[test]
    fn test_session_update_builder() {
        assert!(SessionUpdate::default().is_empty());
        let update = SessionUpdate::default().with_mode(SessionMode::EmbeddedUi);
        assert!(!update.is_empty());
        assert_eq!(update.mode, Some(SessionMode::EmbeddedUi));
    }
}
