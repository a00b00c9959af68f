//! Error types for connection handling.
//!
//! Malformed command lines are not represented here: the tokenizer returns a
//! partial command instead. A peer closing its connection is the normal end
//! of a session and is reported as `Ok(())`.

use thiserror::Error;

/// Reasons a freshly accepted connection is not promoted to a session.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The first line was not the `UtTcpOpen` handshake.
    #[error("handshake failed: expected UtTcpOpen, got {command:?}")]
    HandshakeFailed { command: String },

    /// The handshake carried no `-proto` value.
    #[error("handshake has no -proto value")]
    MissingProtocol,

    /// The requested protocol is not registered.
    #[error("unknown protocol: {0:?}")]
    UnknownProtocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    /// Static label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HandshakeFailed { .. } => "handshake_failed",
            Self::MissingProtocol => "missing_protocol",
            Self::UnknownProtocol(_) => "unknown_protocol",
            Self::Io(_) => "io",
        }
    }
}
