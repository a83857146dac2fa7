//! # termsync
//!
//! Per-session state synchronization and input broadcast for a set of
//! independently running shell sessions.
//!
//! ## Overview
//!
//! - **Session State Store**: keyed per-session records created on first
//!   access, plus the last-seen status of every named connection
//! - **Event Dispatcher**: subscribes to backend event channels and routes
//!   each event to global and key-scoped handlers
//! - **Broadcast**: per-group eligibility registry and concurrent input
//!   fan-out with per-target accounting
//! - **View Composer**: the presentation-ready view of one session
//! - **Lifecycle Manager**: resets state and detaches handlers on close
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        SessionSync                          │
//! ├────────────────────────────────────────────────────────────┤
//! │  EventSource ──► EventDispatcher ──► SessionStore ◄── View  │
//! │                        │                  ▲                 │
//! │                        ▼                  │                 │
//! │                 LifecycleManager ─────────┘                 │
//! │                                                             │
//! │  InputPayload ──► BroadcastCoordinator ──► Transport        │
//! │                        │                                    │
//! │                        ▼                                    │
//! │                 BroadcastRegistry                           │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use termsync::{
//!     ChannelEventSource, Config, InputPayload, SendFuture, SessionSync, Transport,
//!     TransportError,
//! };
//!
//! struct PtyTransport;
//!
//! impl Transport for PtyTransport {
//!     fn send_raw<'a>(&'a self, _session_key: &'a str, _encoded: &'a str) -> SendFuture<'a> {
//!         Box::pin(async { Ok::<(), TransportError>(()) })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     termsync::logging::init_tracing(&config.log);
//!
//!     let source = Arc::new(ChannelEventSource::new());
//!     let sync = SessionSync::new(config, Arc::clone(&source), Arc::new(PtyTransport))?;
//!     sync.start().await?;
//!
//!     sync.register_session("block-1", "tab-1", true);
//!     sync.registry().set_enabled("tab-1", true);
//!     sync.broadcast("tab-1", "block-1", &InputPayload::data(b"uptime\n".to_vec())).await;
//!
//!     sync.close_session("block-1");
//!     sync.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`logging`]: Tracing subscriber setup
//! - [`state`]: Session data model and store
//! - [`events`]: Event sources, dispatcher, handler registries
//! - [`broadcast`]: Broadcast registry and coordinator
//! - [`view`]: Session view composition
//! - [`lifecycle`]: Session cleanup
//! - [`service`]: The `SessionSync` facade

pub mod broadcast;
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod service;
pub mod state;
pub mod view;

// Re-export protocol for convenience
pub use protocol;
pub use protocol::{InputPayload, TermSize};

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export state types for convenience
pub use state::{
    ConnectionKind, ConnectionState, ConnectionStatus, ConnectionStatusIndex, DisplayConfig,
    GroupKey, ProcessRuntimeStatus, ProcessStatus, RuntimeWrite, SessionKey, SessionMode,
    SessionRecord, SessionStore, SessionUpdate,
};

// Re-export event types for convenience
pub use events::{
    ChannelEventSource, ConnectionChangeEvent, DispatchError, DispatcherHandlers, EventDispatcher,
    EventSource, RuntimeStatusEvent, SourceError, UnsubscribeHandle,
};

// Re-export broadcast types for convenience
pub use broadcast::{
    BroadcastCoordinator, BroadcastMode, BroadcastRegistry, BroadcastReport, SendFuture,
    SessionInfo, Transport, TransportError,
};

pub use lifecycle::{CleanupReport, LifecycleManager};
pub use service::{ServiceState, SessionSync};
pub use view::{compose_view, SessionView};
