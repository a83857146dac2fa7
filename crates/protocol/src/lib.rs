//! # termsync Protocol Library
//!
//! Wire definitions shared between the session backend and the termsync
//! core.
//!
//! ## Overview
//!
//! - **Status events**: payloads pushed on `controller:status` and
//!   `terminal:conn-change`
//! - **Status enums**: process and connection states with their wire names
//! - **Input frames**: keyboard data, signals and resizes, encoded once for
//!   delivery to any number of sessions
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{InputPayload, ControllerStatusEvent, decode_payload};
//!
//! let encoded = InputPayload::data(b"echo hi\n".to_vec()).encode().unwrap();
//! assert!(encoded.contains("input_data64"));
//!
//! let event: ControllerStatusEvent = decode_payload(serde_json::json!({
//!     "block_id": "b1",
//!     "version": 1,
//!     "shell_proc_status": "running",
//! }))
//! .unwrap();
//! assert!(event.shell_proc_conn_name.is_none());
//! ```
//!
//! ## Modules
//!
//! - [`events`]: Backend event payloads and channel names
//! - [`status`]: Connection and process status enums
//! - [`input`]: Session input frames
//! - [`error`]: Error types

pub mod error;
pub mod events;
pub mod input;
pub mod status;

pub use error::{ProtocolError, Result};
pub use events::{
    decode_payload, ConnChangeEvent, ConnStatus, ControllerStatusEvent, CONN_CHANGE_EVENT,
    CONTROLLER_STATUS_EVENT,
};
pub use input::{InputFrame, InputPayload, TermSize};
pub use status::{ConnectionState, ProcessStatus};
