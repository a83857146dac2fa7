//! Session input frames.
//!
//! Input is delivered to a session as a JSON frame. Raw bytes travel base64
//! encoded in `input_data64`; signals and terminal resizes use their own
//! fields. A frame is encoded once and the resulting string can be handed to
//! any number of sessions.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Terminal dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Input destined for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPayload {
    /// Keyboard or pasted bytes.
    Data(Vec<u8>),
    /// Signal by name, e.g. `SIGINT`.
    Signal(String),
    /// Terminal resize.
    Resize(TermSize),
}

/// Wire form of [`InputPayload`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_size: Option<TermSize>,
}

impl InputPayload {
    /// Creates a data payload from anything byte-like.
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data(bytes.into())
    }

    /// Creates a signal payload.
    pub fn signal(name: impl Into<String>) -> Self {
        Self::Signal(name.into())
    }

    /// Creates a resize payload.
    pub fn resize(rows: u16, cols: u16) -> Self {
        Self::Resize(TermSize { rows, cols })
    }

    /// Builds the wire frame for this payload.
    pub fn to_frame(&self) -> InputFrame {
        match self {
            Self::Data(bytes) => InputFrame {
                input_data64: Some(BASE64.encode(bytes)),
                ..Default::default()
            },
            Self::Signal(name) => InputFrame {
                sig_name: Some(name.clone()),
                ..Default::default()
            },
            Self::Resize(size) => InputFrame {
                term_size: Some(*size),
                ..Default::default()
            },
        }
    }

    /// Encodes the payload into the string handed to the transport.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(&self.to_frame())
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decodes a string produced by [`InputPayload::encode`].
    ///
    /// A frame carrying several fields decodes to the first of data, signal,
    /// resize.
    pub fn decode(encoded: &str) -> Result<Self> {
        let frame: InputFrame = serde_json::from_str(encoded)?;
        if let Some(data) = frame.input_data64 {
            return Ok(Self::Data(BASE64.decode(data)?));
        }
        if let Some(name) = frame.sig_name {
            return Ok(Self::Signal(name));
        }
        if let Some(size) = frame.term_size {
            return Ok(Self::Resize(size));
        }
        Err(ProtocolError::EmptyInput)
    }
}
