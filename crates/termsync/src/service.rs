//! Service facade wiring all components together.
//!
//! [`SessionSync`] is constructed once by the embedding application. It owns
//! the store, the dispatcher, the broadcast registry and coordinator, and the
//! lifecycle manager, and keeps the store in sync with backend events while
//! started.

use std::sync::Arc;

use protocol::{InputPayload, ProtocolError};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::broadcast::{BroadcastCoordinator, BroadcastRegistry, BroadcastReport, SessionInfo, Transport};
use crate::config::{Config, ConfigError};
use crate::events::{DispatchError, EventDispatcher, EventSource, HandleSet};
use crate::lifecycle::{CleanupReport, LifecycleManager};
use crate::state::{ProcessRuntimeStatus, SessionStore};
use crate::view::{compose_view, SessionView};

/// Service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Not subscribed to backend events.
    Stopped,
    /// Subscribed, and the store follows backend events.
    Running,
}

/// Per-session state sync and input broadcast.
pub struct SessionSync<S: EventSource, T: Transport> {
    config: Config,
    store: Arc<SessionStore>,
    dispatcher: EventDispatcher<S>,
    registry: Arc<BroadcastRegistry>,
    coordinator: BroadcastCoordinator<T>,
    lifecycle: LifecycleManager,
    sync_handles: HandleSet,
    state: Mutex<ServiceState>,
}

impl<S: EventSource, T: Transport> SessionSync<S, T> {
    /// Builds every component from `config`.
    pub fn new(config: Config, source: Arc<S>, transport: Arc<T>) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(SessionStore::with_options(
            config.display.to_display_config(),
            config.store.enforce_runtime_version,
        ));
        let dispatcher = EventDispatcher::with_channels(source, config.events.clone());
        let registry = Arc::new(BroadcastRegistry::new());
        let coordinator = BroadcastCoordinator::new(Arc::clone(&registry), transport);
        let lifecycle = LifecycleManager::new(Arc::clone(&store), Arc::clone(dispatcher.handlers()));

        debug!(
            theme = %config.display.theme_name,
            font_size = config.display.font_size,
            enforce_runtime_version = config.store.enforce_runtime_version,
            "Session sync created"
        );

        Ok(Self {
            config,
            store,
            dispatcher,
            registry,
            coordinator,
            lifecycle,
            sync_handles: HandleSet::new(),
            state: Mutex::new(ServiceState::Stopped),
        })
    }

    /// Subscribes to backend events and starts applying them to the store.
    ///
    /// Does nothing if already running.
    pub async fn start(&self) -> Result<(), DispatchError> {
        let mut state = self.state.lock().await;
        if *state == ServiceState::Running && self.dispatcher.is_initialized().await {
            debug!("Session sync already running");
            return Ok(());
        }

        self.dispatcher.initialize().await?;
        self.sync_handles.dispose_all();
        self.install_store_sync();

        *state = ServiceState::Running;
        info!("Session sync started");
        Ok(())
    }

    /// Ends the subscriptions and drops every handler.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        self.sync_handles.dispose_all();
        self.dispatcher.dispose().await;
        if *state == ServiceState::Running {
            info!("Session sync stopped");
        }
        *state = ServiceState::Stopped;
    }

    pub async fn state(&self) -> ServiceState {
        *self.state.lock().await
    }

    /// Resets a closed session and detaches its handlers.
    pub fn close_session(&self, session_key: &str) -> CleanupReport {
        self.lifecycle.cleanup(session_key)
    }

    pub fn compose_view(&self, session_key: &str, group_key: &str) -> SessionView {
        compose_view(&self.store, session_key, group_key)
    }

    /// Registers a session in `group_key`, deriving eligibility from its mode.
    pub fn register_session(&self, session_key: &str, group_key: &str, is_active: bool) -> SessionInfo {
        let info = SessionInfo::from_view(&self.compose_view(session_key, group_key), is_active);
        self.registry.register(info.clone());
        info
    }

    /// Sends input to the group, or to `current` when broadcast is off.
    pub async fn broadcast(&self, group_key: &str, current: &str, input: &InputPayload) -> usize {
        self.coordinator.broadcast(group_key, current, input).await
    }

    pub async fn broadcast_detailed(
        &self,
        group_key: &str,
        current: &str,
        input: &InputPayload,
    ) -> Result<BroadcastReport, ProtocolError> {
        self.coordinator
            .broadcast_detailed(group_key, current, input)
            .await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &EventDispatcher<S> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &BroadcastCoordinator<T> {
        &self.coordinator
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    fn install_store_sync(&self) {
        let store = Arc::clone(&self.store);
        self.sync_handles
            .push(self.dispatcher.on_runtime_status(move |event| {
                let outcome =
                    store.set_runtime_status(&event.session_key, ProcessRuntimeStatus::clone(event));
                if outcome.is_applied() {
                    if let Some(name) = &event.process_connection_name {
                        store.bind_connection(&event.session_key, name);
                    }
                }
                Ok(())
            }));

        let store = Arc::clone(&self.store);
        self.sync_handles
            .push(self.dispatcher.on_connection_change(move |event| {
                store.apply_connection_change(&event.connection, event.status.clone());
                Ok(())
            }));
    }
}
