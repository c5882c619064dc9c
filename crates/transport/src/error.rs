//! Error types for the transport crate.

use std::time::Duration;

use crate::protocol::ErrorKind;

/// Errors produced by the membership transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Declared frame length exceeds the limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The peer did not answer in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The peer closed the connection before answering.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server answered with an error.
    #[error("{kind}: {message}")]
    Remote { kind: ErrorKind, message: String },

    /// The server answered with the wrong response variant.
    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

impl TransportError {
    /// The server-side error kind, if this error came from the server.
    pub fn remote_kind(&self) -> Option<ErrorKind> {
        match self {
            TransportError::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
