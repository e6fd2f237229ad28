//! Transfer session state machine.
//!
//! ```text
//!                  initiator      ┌──────────────┐   handshake read   ┌───────────────────┐
//!              ┌─────────────────>│ AwaitingPeer │───────────────────>│ HandshakeReceived │──┐
//! ┌──────┐     │                  └──────────────┘                    └───────────────────┘  │
//! │ Idle │─────┤                                                                             │
//! └──────┘     │     receiver     ┌───────────────┐                                          │
//!              └─────────────────>│ HandshakeSent │──────────────────────────────────────┐   │
//!                                 └───────────────┘                                      ↓   ↓
//!                                                        ┌───────────┐  payload   ┌──────────────────┐
//!                                                        │ Completed │<───────────│ PayloadExchanged │
//!                                                        └───────────┘            └──────────────────┘
//! ```
//!
//! Every non-terminal state may also move to `Cancelled` (deadline or
//! interrupt) or `Failed` (any protocol or crypto error).

use std::fmt;

/// Which side of a transfer a session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Holds the secret and waits for a peer to ask for it
    Initiator,
    /// Dials the initiator and stores what it receives
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Receiver => write!(f, "receiver"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingPeer,
    HandshakeSent,
    HandshakeReceived,
    PayloadExchanged,
    Completed,
    Cancelled,
    /// Carries the error message that ended the session
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed(_)
        )
    }

    pub fn can_advance_to(&self, next: &SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Cancelled) | (_, Failed(_)) => true,
            (Idle, AwaitingPeer) | (Idle, HandshakeSent) => true,
            (AwaitingPeer, HandshakeReceived) => true,
            (HandshakeSent, PayloadExchanged) | (HandshakeReceived, PayloadExchanged) => true,
            (PayloadExchanged, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingPeer => write!(f, "awaiting peer"),
            SessionState::HandshakeSent => write!(f, "handshake sent"),
            SessionState::HandshakeReceived => write!(f, "handshake received"),
            SessionState::PayloadExchanged => write!(f, "payload exchanged"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}
