//! Peer-to-peer transfer of a single secret
//!
//! The initiator holds a secret and listens; the receiver dials it with the
//! address the initiator printed. Both sides run a [`TransferSession`] over
//! whatever byte stream connects them, normally one opened by a
//! [`TransferNode`].

mod error;
mod node;
mod session;
mod state;

pub use error::{Phase, TransferError};
pub use node::{parse_node_addr, IncomingStream, Listener, TransferNode, ALPN};
pub use session::{TransferReport, TransferSession};
pub use state::{Role, SessionState};
