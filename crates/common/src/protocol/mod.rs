//! Wire formats of the transfer protocol
//!
//! A transfer stream carries exactly two frames. The receiving peer sends a
//! [`Handshake`] naming its long-term key, and the initiator answers with a
//! [`TransferPayload`] holding the secret granted to that key. Both travel
//! inside a `u32_be` length-prefixed frame, after which the initiator closes
//! the stream.

mod frame;
mod handshake;
mod payload;

pub use frame::{
    read_frame, write_frame, FrameError, FRAME_HEADER_SIZE, MAX_HANDSHAKE_FRAME,
    MAX_PAYLOAD_FRAME,
};
pub use handshake::{Handshake, HandshakeError};
pub use payload::{PayloadError, TransferPayload};
