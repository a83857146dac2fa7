//! Backend status events.
//!
//! These are the payloads the session backend pushes on its event channels.
//! Field names follow the backend's snake_case naming; the in-memory model in
//! `termsync` uses its own names and translates field by field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::status::{ConnectionState, ProcessStatus};

/// Channel carrying [`ControllerStatusEvent`] payloads.
pub const CONTROLLER_STATUS_EVENT: &str = "controller:status";

/// Channel carrying [`ConnChangeEvent`] payloads.
pub const CONN_CHANGE_EVENT: &str = "terminal:conn-change";

/// Runtime status update for one block (session).
///
/// `version` is assigned by the backend and increases with every status
/// change of the same block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatusEvent {
    /// Block (session) identifier.
    pub block_id: String,
    /// Status version.
    pub version: i32,
    /// Shell process status.
    pub shell_proc_status: ProcessStatus,
    /// Connection the shell runs over, if remote.
    #[serde(default)]
    pub shell_proc_conn_name: Option<String>,
    /// Shell exit code.
    #[serde(default)]
    pub shell_proc_exit_code: i32,
}

/// Connection status as serialized by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnStatus {
    pub status: ConnectionState,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub connection: String,
    #[serde(default)]
    pub has_connected: bool,
    #[serde(default)]
    pub active_conn_num: i32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub wsh_enabled: bool,
    #[serde(default)]
    pub wsh_error: Option<String>,
    #[serde(default)]
    pub no_wsh_reason: Option<String>,
    #[serde(default)]
    pub wsh_version: Option<String>,
}

impl Default for ConnStatus {
    fn default() -> Self {
        Self {
            status: ConnectionState::Init,
            connected: false,
            connection: String::new(),
            has_connected: false,
            active_conn_num: 0,
            error: None,
            wsh_enabled: false,
            wsh_error: None,
            no_wsh_reason: None,
            wsh_version: None,
        }
    }
}

/// Connection status change, keyed by connection name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnChangeEvent {
    /// Connection name (e.g. `user@host`, `wsl://Ubuntu`).
    pub connection: String,
    /// Full status of the connection after the change.
    pub status: ConnStatus,
}

/// Decodes a JSON event payload into one of the event types above.
pub fn decode_payload<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T> {
    Ok(serde_json::from_value(payload)?)
}
