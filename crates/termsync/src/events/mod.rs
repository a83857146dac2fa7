//! Backend event subscription and handler dispatch.
//!
//! - [`EventSource`]: subscription primitive for named channels
//! - [`EventDispatcher`]: owns the subscriptions and demultiplexes events
//! - [`DispatcherHandlers`]: global and key-scoped handler registries
//! - [`UnsubscribeHandle`]: removes one handler when disposed

pub mod dispatcher;
pub mod handlers;
pub mod source;
pub mod types;

pub use dispatcher::{DispatchError, EventDispatcher};
pub use handlers::{DispatcherHandlers, Handler, HandleSet, HandlerRegistry, UnsubscribeHandle};
pub use source::{ChannelEventSource, EventSource, SourceError};
pub use types::{ConnectionChangeEvent, RuntimeStatusEvent, ScopedEvent};
