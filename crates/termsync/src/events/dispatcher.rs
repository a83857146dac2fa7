//! Event dispatcher.
//!
//! Subscribes once to the runtime-status and connection-change channels of an
//! [`EventSource`], decodes each payload into its domain event, and hands it to
//! the registered handlers. One pump task runs per channel until
//! [`EventDispatcher::dispose`] cancels it.

use std::sync::Arc;

use protocol::events::{decode_payload, ConnChangeEvent, ControllerStatusEvent};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::handlers::{DispatcherHandlers, HandlerRegistry, UnsubscribeHandle};
use super::source::{EventSource, SourceError};
use super::types::{ConnectionChangeEvent, RuntimeStatusEvent, ScopedEvent};
use crate::config::EventsConfig;

/// Errors surfaced by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Subscribing to an event channel failed.
    #[error("subscribe error: {0}")]
    Subscribe(#[from] SourceError),
}

struct ActiveSubscriptions {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Demultiplexes backend events to global and key-scoped handlers.
pub struct EventDispatcher<S: EventSource> {
    source: Arc<S>,
    channels: EventsConfig,
    handlers: Arc<DispatcherHandlers>,
    active: Mutex<Option<ActiveSubscriptions>>,
}

impl<S: EventSource> EventDispatcher<S> {
    /// Creates a dispatcher listening on the default channel names.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_channels(source, EventsConfig::default())
    }

    pub fn with_channels(source: Arc<S>, channels: EventsConfig) -> Self {
        Self {
            source,
            channels,
            handlers: Arc::new(DispatcherHandlers::new()),
            active: Mutex::new(None),
        }
    }

    /// Subscribes to both channels and starts the pump tasks.
    ///
    /// Calling this while already initialized does nothing. Concurrent callers
    /// are serialized, so exactly one subscription per channel exists.
    pub async fn initialize(&self) -> Result<(), DispatchError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            debug!("Event dispatcher already initialized");
            return Ok(());
        }

        let runtime_rx = self
            .source
            .subscribe(&self.channels.runtime_status_channel)
            .await?;
        let connection_rx = self
            .source
            .subscribe(&self.channels.connection_change_channel)
            .await?;

        let cancel = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(pump::<ControllerStatusEvent, RuntimeStatusEvent>(
                self.channels.runtime_status_channel.clone(),
                runtime_rx,
                Arc::clone(self.handlers.runtime()),
                cancel.clone(),
            )),
            tokio::spawn(pump::<ConnChangeEvent, ConnectionChangeEvent>(
                self.channels.connection_change_channel.clone(),
                connection_rx,
                Arc::clone(self.handlers.connection()),
                cancel.clone(),
            )),
        ];

        *active = Some(ActiveSubscriptions { cancel, tasks });
        info!(
            runtime_channel = %self.channels.runtime_status_channel,
            connection_channel = %self.channels.connection_change_channel,
            "Event dispatcher initialized"
        );
        Ok(())
    }

    /// Stops the pump tasks and drops every registered handler.
    ///
    /// Safe to call repeatedly. A later [`initialize`](Self::initialize)
    /// subscribes again.
    pub async fn dispose(&self) {
        let mut active = self.active.lock().await;
        if let Some(subscriptions) = active.take() {
            subscriptions.cancel.cancel();
            for task in subscriptions.tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Event pump task ended abnormally");
                }
            }
            info!("Event dispatcher disposed");
        }
        self.handlers.clear();
    }

    pub async fn is_initialized(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub fn on_runtime_status<F>(&self, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&RuntimeStatusEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.on_runtime_status(handler)
    }

    pub fn on_session_runtime_status<F>(&self, session_key: &str, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&RuntimeStatusEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.on_session_runtime_status(session_key, handler)
    }

    pub fn on_connection_change<F>(&self, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&ConnectionChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.on_connection_change(handler)
    }

    pub fn on_connection_status<F>(&self, connection_name: &str, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&ConnectionChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.on_connection_status(connection_name, handler)
    }

    /// Delivers a runtime-status event produced in-process. Returns the
    /// number of handlers invoked.
    pub fn dispatch_runtime_status(&self, event: &RuntimeStatusEvent) -> usize {
        self.handlers.dispatch_runtime_status(event)
    }

    /// Delivers a connection-change event produced in-process. Returns the
    /// number of handlers invoked.
    pub fn dispatch_connection_change(&self, event: &ConnectionChangeEvent) -> usize {
        self.handlers.dispatch_connection_change(event)
    }

    pub fn remove_session_handlers(&self, session_key: &str) -> usize {
        self.handlers.remove_session_handlers(session_key)
    }

    /// Registries shared with the lifecycle manager.
    pub fn handlers(&self) -> &Arc<DispatcherHandlers> {
        &self.handlers
    }

    pub fn channels(&self) -> &EventsConfig {
        &self.channels
    }
}

/// Reads payloads off one subscription until cancelled or the source closes.
async fn pump<W, E>(
    channel: String,
    mut rx: mpsc::Receiver<serde_json::Value>,
    handlers: Arc<HandlerRegistry<E>>,
    cancel: CancellationToken,
) where
    W: DeserializeOwned,
    E: From<W> + ScopedEvent + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(channel = %channel, "Event pump cancelled");
                break;
            }
            payload = rx.recv() => {
                let Some(payload) = payload else {
                    debug!(channel = %channel, "Event channel closed");
                    break;
                };
                match decode_payload::<W>(payload) {
                    Ok(wire) => {
                        let event = E::from(wire);
                        let invoked = handlers.dispatch(&event);
                        trace!(channel = %channel, key = %event.scope_key(), invoked, "Dispatched event");
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Skipping undecodable event payload");
                    }
                }
            }
        }
    }
}
