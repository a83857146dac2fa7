//! Composed per-session view for the presentation layer.

use serde::{Deserialize, Serialize};

use crate::state::{
    ConnectionKind, ConnectionStatus, DisplayConfig, GroupKey, ProcessRuntimeStatus, ProcessStatus,
    SessionKey, SessionMode, SessionStore,
};

/// Everything the presentation layer needs to render one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_key: SessionKey,
    pub group_key: GroupKey,
    pub mode: SessionMode,
    pub connection_status: ConnectionStatus,
    pub display_config: DisplayConfig,
    pub process_status: ProcessStatus,
    pub runtime_status: ProcessRuntimeStatus,
    pub connection_kind: ConnectionKind,
}

/// Builds the view of `session_key` from a single snapshot of its record.
///
/// Creates the record with defaults if the store has not seen the key yet.
pub fn compose_view(store: &SessionStore, session_key: &str, group_key: &str) -> SessionView {
    let record = store.get(session_key);
    SessionView {
        session_key: session_key.to_string(),
        group_key: group_key.to_string(),
        mode: record.mode,
        connection_kind: record.connection_status.kind(),
        connection_status: record.connection_status.clone(),
        display_config: record.display_config.clone(),
        process_status: record.process_status,
        runtime_status: record.runtime_status.clone(),
    }
}
