use std::fmt;

use crate::crypto::KeyError;
use crate::protocol::{FrameError, HandshakeError, PayloadError};
use crate::secret::{GrantError, SecretError};

/// Protocol step a frame belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshake,
    Payload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Handshake => write!(f, "handshake"),
            Phase::Payload => write!(f, "payload"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("{phase} frame error: {source}")]
    Frame {
        phase: Phase,
        #[source]
        source: FrameError,
    },
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("handshake carries an unusable key: {0}")]
    Key(#[from] KeyError),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("grant error: {0}")]
    Grant(#[from] GrantError),
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("received secret cannot be opened: {0}")]
    Open(#[source] SecretError),
    #[error("secret store error: {0}")]
    Store(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("session cancelled")]
    Cancelled,
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl TransferError {
    pub(crate) fn frame(phase: Phase) -> impl FnOnce(FrameError) -> Self {
        move |source| TransferError::Frame { phase, source }
    }
}
