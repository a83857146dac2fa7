//! Keyed session state store.
//!
//! Records are created lazily on first access and replaced wholesale on every
//! write, so an `Arc<SessionRecord>` obtained earlier is never mutated under
//! the reader. Each write to a key runs under that key's shard lock, which
//! makes multi-field updates and resets atomic with respect to each other.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use super::model::{
    ConnectionStatus, DisplayConfig, ProcessRuntimeStatus, ProcessStatus, RuntimeWrite,
    SessionKey, SessionMode, SessionRecord, SessionUpdate,
};

/// Last-seen status per connection name.
///
/// Several sessions may share one connection, so this index is keyed by the
/// connection name rather than the session key. Entries are replaced, never
/// merged.
#[derive(Debug, Default)]
pub struct ConnectionStatusIndex {
    entries: DashMap<String, Arc<ConnectionStatus>>,
}

impl ConnectionStatusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last status recorded for `connection_name`.
    pub fn get(&self, connection_name: &str) -> Option<Arc<ConnectionStatus>> {
        self.entries
            .get(connection_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Replaces the entry for `connection_name`.
    pub fn replace(&self, connection_name: &str, status: ConnectionStatus) {
        self.entries
            .insert(connection_name.to_string(), Arc::new(status));
    }

    /// Returns all entries sorted by connection name.
    pub fn snapshot(&self) -> Vec<(String, Arc<ConnectionStatus>)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keyed collection of per-session records.
#[derive(Debug)]
pub struct SessionStore {
    records: DashMap<SessionKey, Arc<SessionRecord>>,
    connections: ConnectionStatusIndex,
    display_defaults: RwLock<DisplayConfig>,
    enforce_runtime_version: bool,
}

impl SessionStore {
    /// Creates a store with built-in display defaults and version enforcement on.
    pub fn new() -> Self {
        Self::with_options(DisplayConfig::default(), true)
    }

    /// Creates a store with explicit display defaults and version policy.
    pub fn with_options(display_defaults: DisplayConfig, enforce_runtime_version: bool) -> Self {
        Self {
            records: DashMap::new(),
            connections: ConnectionStatusIndex::new(),
            display_defaults: RwLock::new(display_defaults),
            enforce_runtime_version,
        }
    }

    /// Returns the record for `key`, creating a default one if absent.
    pub fn get(&self, key: &str) -> Arc<SessionRecord> {
        if let Some(entry) = self.records.get(key) {
            return Arc::clone(entry.value());
        }

        let entry = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(SessionRecord::new(key, self.display_defaults())));
        Arc::clone(entry.value())
    }

    /// Returns the record for `key` without creating it.
    pub fn peek(&self, key: &str) -> Option<Arc<SessionRecord>> {
        self.records.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Applies a partial update in a single write.
    ///
    /// A runtime status in the update also sets `process_status`. If that
    /// runtime status is stale it is dropped together with its derived
    /// process status; the other fields of the update still apply.
    pub fn set(&self, key: &str, update: SessionUpdate) -> RuntimeWrite {
        let indexed = update
            .connection_status
            .as_ref()
            .map(|status| status.clone().normalized())
            .filter(|status| !status.connection_name.is_empty());

        let outcome = self.write(key, |record| {
            if let Some(mode) = update.mode {
                record.mode = mode;
            }
            if let Some(config) = update.display_config {
                record.display_config = config;
            }
            if let Some(status) = update.connection_status {
                record.connection_status = merge_connection(key, &record.connection_status, status);
            }
            if let Some(status) = update.process_status {
                record.process_status = status;
            }
            match update.runtime_status {
                Some(status) => self.apply_runtime(key, record, status),
                None => RuntimeWrite::Applied,
            }
        });

        if let Some(status) = indexed {
            let name = status.connection_name.clone();
            self.connections.replace(&name, status);
        }

        outcome
    }

    pub fn mode(&self, key: &str) -> SessionMode {
        self.get(key).mode
    }

    pub fn set_mode(&self, key: &str, mode: SessionMode) {
        self.set(key, SessionUpdate::default().with_mode(mode));
    }

    pub fn connection_status(&self, key: &str) -> ConnectionStatus {
        self.get(key).connection_status.clone()
    }

    /// Stores the session's connection status and refreshes the
    /// [`ConnectionStatusIndex`] entry for its connection name.
    pub fn set_connection_status(&self, key: &str, status: ConnectionStatus) {
        self.set(key, SessionUpdate::default().with_connection_status(status));
    }

    pub fn display_config(&self, key: &str) -> DisplayConfig {
        self.get(key).display_config.clone()
    }

    pub fn set_display_config(&self, key: &str, config: DisplayConfig) {
        self.set(key, SessionUpdate::default().with_display_config(config));
    }

    pub fn process_status(&self, key: &str) -> ProcessStatus {
        self.get(key).process_status
    }

    pub fn set_process_status(&self, key: &str, status: ProcessStatus) {
        self.set(key, SessionUpdate::default().with_process_status(status));
    }

    pub fn runtime_status(&self, key: &str) -> ProcessRuntimeStatus {
        self.get(key).runtime_status.clone()
    }

    /// Stores a runtime status and the process status derived from it.
    pub fn set_runtime_status(&self, key: &str, status: ProcessRuntimeStatus) -> RuntimeWrite {
        self.set(key, SessionUpdate::default().with_runtime_status(status))
    }

    /// Replaces the record for `key` with a default one built from the
    /// current display defaults.
    pub fn reset(&self, key: &str) {
        let record = SessionRecord::new(key, self.display_defaults());
        self.records.insert(key.to_string(), Arc::new(record));
        tracing::debug!(session_key = %key, "Session state reset to defaults");
    }

    /// Records a connection change for `connection_name`.
    ///
    /// Replaces the index entry and refreshes every session currently bound
    /// to that connection. Returns the number of sessions refreshed.
    pub fn apply_connection_change(&self, connection_name: &str, status: ConnectionStatus) -> usize {
        let mut status = status.normalized();
        if status.connection_name.is_empty() {
            status.connection_name = connection_name.to_string();
        }
        self.connections.replace(connection_name, status.clone());

        let bound: Vec<SessionKey> = self
            .records
            .iter()
            .filter(|entry| entry.value().connection_status.connection_name == connection_name)
            .map(|entry| entry.key().clone())
            .collect();

        let mut refreshed = 0;
        for key in &bound {
            let updated = self.write(key, |record| {
                // the session may have been reset or rebound since it was collected
                if record.connection_status.connection_name != connection_name {
                    return false;
                }
                record.connection_status =
                    merge_connection(key, &record.connection_status, status.clone());
                true
            });
            if updated {
                refreshed += 1;
            }
        }

        tracing::debug!(
            connection = %connection_name,
            status = %status.status,
            sessions = refreshed,
            "Applied connection change"
        );
        refreshed
    }

    /// Binds a session to `connection_name`, seeding its connection status
    /// from the index. Returns false if the session was already bound to it.
    pub fn bind_connection(&self, key: &str, connection_name: &str) -> bool {
        let seed = self
            .connections
            .get(connection_name)
            .map(|status| ConnectionStatus::clone(&status))
            .unwrap_or_else(|| ConnectionStatus::new(connection_name));

        self.write(key, |record| {
            if record.connection_status.connection_name == connection_name {
                return false;
            }
            record.connection_status = merge_connection(key, &record.connection_status, seed);
            true
        })
    }

    /// Last status seen for a connection name.
    pub fn connection(&self, connection_name: &str) -> Option<ConnectionStatus> {
        self.connections
            .get(connection_name)
            .map(|status| ConnectionStatus::clone(&status))
    }

    /// The connection status index.
    pub fn connections(&self) -> &ConnectionStatusIndex {
        &self.connections
    }

    /// Display defaults applied to records created from now on.
    pub fn display_defaults(&self) -> DisplayConfig {
        self.display_defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Changes the display defaults. Existing records keep their config.
    pub fn set_display_defaults(&self, config: DisplayConfig) {
        *self
            .display_defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn enforces_runtime_version(&self) -> bool {
        self.enforce_runtime_version
    }

    /// Keys of all known records, sorted.
    pub fn session_keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<_> = self.records.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy-on-write update of one record under its shard lock.
    fn write<R>(&self, key: &str, f: impl FnOnce(&mut SessionRecord) -> R) -> R {
        let mut entry = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(SessionRecord::new(key, self.display_defaults())));

        let mut next = SessionRecord::clone(entry.value());
        let out = f(&mut next);
        *entry.value_mut() = Arc::new(next);
        out
    }

    fn apply_runtime(
        &self,
        key: &str,
        record: &mut SessionRecord,
        mut status: ProcessRuntimeStatus,
    ) -> RuntimeWrite {
        let current = record.runtime_status.version;
        if self.enforce_runtime_version && status.version < current {
            tracing::debug!(
                session_key = %key,
                current,
                incoming = status.version,
                "Dropping stale runtime status"
            );
            return RuntimeWrite::Stale {
                current,
                incoming: status.version,
            };
        }

        if status.session_key != key {
            tracing::debug!(
                session_key = %key,
                payload_key = %status.session_key,
                "Runtime status carried a different session key"
            );
            status.session_key = key.to_string();
        }

        record.process_status = status.process_status;
        record.runtime_status = status;
        RuntimeWrite::Applied
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_connection(key: &str, current: &ConnectionStatus, incoming: ConnectionStatus) -> ConnectionStatus {
    let mut next = incoming.normalized();
    next.has_ever_connected |= current.has_ever_connected;

    if current.connection_name == next.connection_name
        && current.status != next.status
        && !current.status.can_transition_to(next.status)
    {
        tracing::debug!(
            session_key = %key,
            from = %current.status,
            to = %next.status,
            "Unexpected connection state transition"
        );
    }
    next
}
