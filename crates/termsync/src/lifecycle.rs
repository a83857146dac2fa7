//! Session teardown.
//!
//! Closing a session resets its store record and detaches everything that was
//! listening on its behalf. Broadcast membership is left to the caller.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::events::{DispatcherHandlers, UnsubscribeHandle};
use crate::state::{SessionKey, SessionStore};

/// What [`LifecycleManager::cleanup`] detached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Runtime-status handlers scoped to the session.
    pub scoped_handlers: usize,
    /// Handles registered through [`LifecycleManager::track`].
    pub tracked_handles: usize,
}

/// Resets session state and detaches per-session handlers.
#[derive(Debug)]
pub struct LifecycleManager {
    store: Arc<SessionStore>,
    handlers: Arc<DispatcherHandlers>,
    tracked: DashMap<SessionKey, Vec<UnsubscribeHandle>>,
}

impl LifecycleManager {
    pub fn new(store: Arc<SessionStore>, handlers: Arc<DispatcherHandlers>) -> Self {
        Self {
            store,
            handlers,
            tracked: DashMap::new(),
        }
    }

    /// Ties a handle to a session so that [`cleanup`](Self::cleanup) disposes it.
    pub fn track(&self, session_key: &str, handle: UnsubscribeHandle) {
        self.tracked
            .entry(session_key.to_string())
            .or_default()
            .push(handle);
    }

    /// Number of handles tracked for a session.
    pub fn tracked_count(&self, session_key: &str) -> usize {
        self.tracked.get(session_key).map(|h| h.len()).unwrap_or(0)
    }

    /// Resets the session's record to the current defaults in one write and
    /// detaches its scoped and tracked handlers.
    pub fn cleanup(&self, session_key: &str) -> CleanupReport {
        self.store.reset(session_key);

        let scoped_handlers = self.handlers.remove_session_handlers(session_key);

        let handles = self
            .tracked
            .remove(session_key)
            .map(|(_, handles)| handles)
            .unwrap_or_default();
        for handle in &handles {
            handle.dispose();
        }

        let report = CleanupReport {
            scoped_handlers,
            tracked_handles: handles.len(),
        };
        info!(
            session_key = %session_key,
            scoped_handlers = report.scoped_handlers,
            tracked_handles = report.tracked_handles,
            "Session cleaned up"
        );
        report
    }
}
