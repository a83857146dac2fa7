//! Input fan-out to broadcast groups.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::join_all;
use protocol::{InputPayload, ProtocolError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::registry::BroadcastRegistry;
use crate::state::SessionKey;

/// Errors a [`Transport`] reports for a single send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No session with that key is attached.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The session no longer accepts input.
    #[error("session closed: {0}")]
    Closed(String),

    /// The send itself failed.
    #[error("send failed: {0}")]
    Send(String),
}

/// Future returned by [`Transport::send_raw`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Reliable, order-preserving delivery of encoded input to one session.
pub trait Transport: Send + Sync + 'static {
    /// Sends an encoded input frame to `session_key`.
    fn send_raw<'a>(&'a self, session_key: &'a str, encoded: &'a str) -> SendFuture<'a>;
}

/// How a broadcast call picked its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    /// Every eligible, active session of the group.
    Group,
    /// Only the caller's current session.
    Single,
}

/// Per-target outcome of one broadcast call.
#[derive(Debug, Clone)]
pub struct BroadcastReport {
    pub broadcast_id: Uuid,
    pub mode: BroadcastMode,
    /// Sessions that received the input.
    pub delivered: Vec<SessionKey>,
    /// Sessions whose send failed, with the reason.
    pub failed: Vec<(SessionKey, TransportError)>,
}

impl BroadcastReport {
    pub fn target_count(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn success_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// At least one target, and every send succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.delivered.is_empty() && self.failed.is_empty()
    }

    /// At least one target, and every send failed.
    pub fn all_failed(&self) -> bool {
        self.delivered.is_empty() && !self.failed.is_empty()
    }

    /// Some sends succeeded and some failed.
    pub fn is_partial(&self) -> bool {
        !self.delivered.is_empty() && !self.failed.is_empty()
    }
}

/// Sends input to the targets of a broadcast group.
pub struct BroadcastCoordinator<T: Transport> {
    registry: Arc<BroadcastRegistry>,
    transport: Arc<T>,
}

impl<T: Transport> BroadcastCoordinator<T> {
    pub fn new(registry: Arc<BroadcastRegistry>, transport: Arc<T>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Sends `input` and returns the number of successful sends.
    ///
    /// With broadcast enabled for `group_key` the input goes to every
    /// eligible, active session; otherwise only to `current`.
    pub async fn broadcast(&self, group_key: &str, current: &str, input: &InputPayload) -> usize {
        match self.broadcast_detailed(group_key, current, input).await {
            Ok(report) => report.success_count(),
            Err(e) => {
                warn!(group_key = %group_key, error = %e, "Failed to encode broadcast input");
                0
            }
        }
    }

    /// Like [`broadcast`](Self::broadcast), with per-target outcomes.
    ///
    /// Targets are captured when the call starts. The input is encoded once
    /// and sent to all targets concurrently; the call returns after every
    /// send has settled.
    pub async fn broadcast_detailed(
        &self,
        group_key: &str,
        current: &str,
        input: &InputPayload,
    ) -> Result<BroadcastReport, ProtocolError> {
        let broadcast_id = Uuid::new_v4();
        let encoded = input.encode()?;

        let (mode, targets): (_, Vec<SessionKey>) = if self.registry.is_enabled(group_key) {
            let targets = self
                .registry
                .eligible_targets(group_key)
                .into_iter()
                .map(|info| info.session_key)
                .collect();
            (BroadcastMode::Group, targets)
        } else {
            (BroadcastMode::Single, vec![current.to_string()])
        };

        let sends = targets.into_iter().map(|session_key| {
            let encoded = encoded.as_str();
            async move {
                let result = self.transport.send_raw(&session_key, encoded).await;
                (session_key, result)
            }
        });

        let mut report = BroadcastReport {
            broadcast_id,
            mode,
            delivered: Vec::new(),
            failed: Vec::new(),
        };
        for (session_key, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered.push(session_key),
                Err(e) => {
                    warn!(
                        broadcast_id = %broadcast_id,
                        group_key = %group_key,
                        session_key = %session_key,
                        error = %e,
                        "Broadcast send failed"
                    );
                    report.failed.push((session_key, e));
                }
            }
        }

        debug!(
            broadcast_id = %broadcast_id,
            group_key = %group_key,
            mode = ?mode,
            delivered = report.success_count(),
            failed = report.failure_count(),
            "Broadcast complete"
        );
        Ok(report)
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::registry::SessionInfo;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
        failing: HashSet<String>,
    }

    impl RecordingTransport {
        fn failing(keys: &[&str]) -> Self {
            Self {
                failing: keys.iter().map(|k| k.to_string()).collect(),
                ..Default::default()
            }
        }

        fn sent_keys(&self) -> Vec<String> {
            let mut keys: Vec<_> = self.sent.lock().unwrap().iter().map(|(k, _)| k.clone()).collect();
            keys.sort();
            keys
        }
    }

    impl Transport for RecordingTransport {
        fn send_raw<'a>(&'a self, session_key: &'a str, encoded: &'a str) -> SendFuture<'a> {
            Box::pin(async move {
                self.sent
                    .lock()
                    .unwrap()
                    .push((session_key.to_string(), encoded.to_string()));
                if self.failing.contains(session_key) {
                    return Err(TransportError::Closed(session_key.to_string()));
                }
                Ok(())
            })
        }
    }

    fn setup(transport: RecordingTransport) -> BroadcastCoordinator<RecordingTransport> {
        let registry = Arc::new(BroadcastRegistry::new());
        for key in ["a", "b", "c"] {
            registry.register(SessionInfo::new(key, "tab", true, true));
        }
        BroadcastCoordinator::new(registry, Arc::new(transport))
    }

    #[tokio::test]
    async fn test_disabled_sends_to_current_only() {
        let coordinator = setup(RecordingTransport::default());

        let count = coordinator
            .broadcast("tab", "b", &InputPayload::data(b"ls\n".to_vec()))
            .await;

        assert_eq!(count, 1);
        assert_eq!(coordinator.transport().sent_keys(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_disabled_failure_returns_zero() {
        let coordinator = setup(RecordingTransport::failing(&["b"]));

        let count = coordinator
            .broadcast("tab", "b", &InputPayload::signal("SIGINT"))
            .await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_enabled_sends_same_frame_to_all() {
        let coordinator = setup(RecordingTransport::default());
        coordinator.registry().set_enabled("tab", true);

        let input = InputPayload::data(b"pwd\n".to_vec());
        let report = coordinator
            .broadcast_detailed("tab", "a", &input)
            .await
            .unwrap();

        assert_eq!(report.mode, BroadcastMode::Group);
        assert!(report.all_succeeded());
        assert_eq!(coordinator.transport().sent_keys(), vec!["a", "b", "c"]);

        let expected = input.encode().unwrap();
        let sent = coordinator.transport().sent.lock().unwrap();
        assert!(sent.iter().all(|(_, frame)| *frame == expected));
    }

    #[tokio::test]
    async fn test_partial_failure_report() {
        let coordinator = setup(RecordingTransport::failing(&["b"]));
        coordinator.registry().set_enabled("tab", true);

        let report = coordinator
            .broadcast_detailed("tab", "a", &InputPayload::resize(40, 120))
            .await
            .unwrap();

        assert!(report.is_partial());
        assert!(!report.all_failed());
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failed[0].0, "b");
        assert_eq!(report.target_count(), 3);
    }

    #[tokio::test]
    async fn test_all_failed_report() {
        let coordinator = setup(RecordingTransport::failing(&["a", "b", "c"]));
        coordinator.registry().set_enabled("tab", true);

        let report = coordinator
            .broadcast_detailed("tab", "a", &InputPayload::signal("SIGTERM"))
            .await
            .unwrap();
        assert!(report.all_failed());
        assert_eq!(report.success_count(), 0);
    }

    #[tokio::test]
    async fn test_enabled_with_no_targets_returns_zero() {
        let registry = Arc::new(BroadcastRegistry::new());
        registry.register(SessionInfo::new("ui", "tab", false, true));
        registry.set_enabled("tab", true);
        let coordinator = BroadcastCoordinator::new(registry, Arc::new(RecordingTransport::default()));

        let count = coordinator
            .broadcast("tab", "ui", &InputPayload::data(b"x".to_vec()))
            .await;

        assert_eq!(count, 0);
        assert!(coordinator.transport().sent_keys().is_empty());
    }
}
