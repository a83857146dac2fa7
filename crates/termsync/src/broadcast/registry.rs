//! Broadcast group registry.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{GroupKey, SessionKey, SessionMode};
use crate::view::SessionView;

/// Registration of one session in a broadcast group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_key: SessionKey,
    pub group_key: GroupKey,
    /// The session can accept broadcast input.
    pub is_eligible: bool,
    /// The session is currently visible or attached.
    pub is_active: bool,
}

impl SessionInfo {
    pub fn new(
        session_key: impl Into<SessionKey>,
        group_key: impl Into<GroupKey>,
        is_eligible: bool,
        is_active: bool,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            group_key: group_key.into(),
            is_eligible,
            is_active,
        }
    }

    /// Builds the registration for a composed view. Embedded UI sessions are
    /// never eligible.
    pub fn from_view(view: &SessionView, is_active: bool) -> Self {
        Self {
            session_key: view.session_key.clone(),
            group_key: view.group_key.clone(),
            is_eligible: view.mode == SessionMode::Standard,
            is_active,
        }
    }

    /// Both flags set.
    pub fn is_target(&self) -> bool {
        self.is_eligible && self.is_active
    }
}

#[derive(Debug, Clone, Default)]
struct GroupState {
    enabled: bool,
    sessions: Vec<SessionInfo>,
}

impl GroupState {
    fn is_vacant(&self) -> bool {
        !self.enabled && self.sessions.is_empty()
    }
}

/// Per-group registrations and broadcast flags.
#[derive(Debug, Default)]
pub struct BroadcastRegistry {
    groups: DashMap<GroupKey, Arc<GroupState>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to its group, or replaces its existing entry in place.
    pub fn register(&self, info: SessionInfo) {
        let group_key = info.group_key.clone();
        let session_key = info.session_key.clone();
        let replaced = self.update(&group_key, |group| {
            match group
                .sessions
                .iter_mut()
                .find(|existing| existing.session_key == info.session_key)
            {
                Some(existing) => {
                    *existing = info;
                    true
                }
                None => {
                    group.sessions.push(info);
                    false
                }
            }
        });
        debug!(
            group_key = %group_key,
            session_key = %session_key,
            replaced,
            "Registered broadcast session"
        );
    }

    /// Removes a session from a group. Returns false if it was not registered.
    pub fn unregister(&self, group_key: &str, session_key: &str) -> bool {
        let removed = self.update(group_key, |group| {
            let before = group.sessions.len();
            group.sessions.retain(|info| info.session_key != session_key);
            group.sessions.len() != before
        });
        if removed {
            debug!(group_key = %group_key, session_key = %session_key, "Unregistered broadcast session");
        }
        removed
    }

    /// Sessions of `group_key` that are both eligible and active, in
    /// registration order.
    pub fn eligible_targets(&self, group_key: &str) -> Vec<SessionInfo> {
        self.snapshot(group_key)
            .map(|group| group.sessions.iter().filter(|info| info.is_target()).cloned().collect())
            .unwrap_or_default()
    }

    /// Every registered session of `group_key`, in registration order.
    pub fn sessions(&self, group_key: &str) -> Vec<SessionInfo> {
        self.snapshot(group_key)
            .map(|group| group.sessions.clone())
            .unwrap_or_default()
    }

    pub fn session(&self, group_key: &str, session_key: &str) -> Option<SessionInfo> {
        self.snapshot(group_key).and_then(|group| {
            group
                .sessions
                .iter()
                .find(|info| info.session_key == session_key)
                .cloned()
        })
    }

    /// Updates the active flag of a registered session. Returns false if the
    /// session is not registered in the group.
    pub fn set_active(&self, group_key: &str, session_key: &str, is_active: bool) -> bool {
        self.update_session(group_key, session_key, |info| info.is_active = is_active)
    }

    /// Updates the eligible flag of a registered session. Returns false if the
    /// session is not registered in the group.
    pub fn set_eligible(&self, group_key: &str, session_key: &str, is_eligible: bool) -> bool {
        self.update_session(group_key, session_key, |info| info.is_eligible = is_eligible)
    }

    pub fn set_enabled(&self, group_key: &str, enabled: bool) {
        self.update(group_key, |group| group.enabled = enabled);
        debug!(group_key = %group_key, enabled, "Broadcast mode changed");
    }

    /// Broadcast flag of a group; false for unknown groups.
    pub fn is_enabled(&self, group_key: &str) -> bool {
        self.snapshot(group_key)
            .map(|group| group.enabled)
            .unwrap_or(false)
    }

    /// Flips the broadcast flag and returns the new value.
    pub fn toggle_enabled(&self, group_key: &str) -> bool {
        let enabled = self.update(group_key, |group| {
            group.enabled = !group.enabled;
            group.enabled
        });
        debug!(group_key = %group_key, enabled, "Broadcast mode toggled");
        enabled
    }

    /// Keys of groups with registrations or broadcast enabled, sorted.
    pub fn group_keys(&self) -> Vec<GroupKey> {
        let mut keys: Vec<_> = self.groups.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    fn snapshot(&self, group_key: &str) -> Option<Arc<GroupState>> {
        self.groups.get(group_key).map(|entry| Arc::clone(entry.value()))
    }

    fn update_session(
        &self,
        group_key: &str,
        session_key: &str,
        f: impl FnOnce(&mut SessionInfo),
    ) -> bool {
        if self.snapshot(group_key).is_none() {
            return false;
        }
        self.update(group_key, |group| {
            match group
                .sessions
                .iter_mut()
                .find(|info| info.session_key == session_key)
            {
                Some(info) => {
                    f(info);
                    true
                }
                None => false,
            }
        })
    }

    /// Copy-on-write update of one group. Groups left with no sessions and
    /// broadcast disabled are dropped.
    fn update<R>(&self, group_key: &str, f: impl FnOnce(&mut GroupState) -> R) -> R {
        let out = {
            let mut entry = self
                .groups
                .entry(group_key.to_string())
                .or_insert_with(|| Arc::new(GroupState::default()));
            let mut next = GroupState::clone(entry.value());
            let out = f(&mut next);
            *entry.value_mut() = Arc::new(next);
            out
        };
        self.groups.remove_if(group_key, |_, group| group.is_vacant());
        out
    }
}
