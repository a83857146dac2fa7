//! Session state: data model and the keyed store holding it.

pub mod model;
pub mod store;

pub use model::{
    ConnectionKind, ConnectionState, ConnectionStatus, DisplayConfig, GroupKey, ProcessRuntimeStatus,
    ProcessStatus, RuntimeWrite, SessionKey, SessionMode, SessionRecord, SessionUpdate,
    DEFAULT_FONT_SIZE, DEFAULT_THEME_NAME,
};
pub use store::{ConnectionStatusIndex, SessionStore};
