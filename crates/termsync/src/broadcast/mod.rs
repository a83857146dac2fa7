//! Broadcast groups and concurrent input fan-out.

pub mod coordinator;
pub mod registry;

pub use coordinator::{
    BroadcastCoordinator, BroadcastMode, BroadcastReport, SendFuture, Transport, TransportError,
};
pub use registry::{BroadcastRegistry, SessionInfo};
