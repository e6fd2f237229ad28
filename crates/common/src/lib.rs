/**
 * Cryptographic types and operations.
 *  - RSA and EC identities behind one type
 *  - Hybrid envelope encryption
 */
pub mod crypto;
/**
 * Wire formats spoken between two peers
 *  during a transfer.
 */
pub mod protocol;
/**
 * Secrets at rest: the stored record,
 *  re-encryption for a new recipient,
 *  and the stores that hold them.
 */
pub mod secret;
/**
 * Transfer sessions and the iroh node
 *  they run over.
 */
pub mod transfer;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{Envelope, Identity, KeyType, PublicKey};
    pub use crate::secret::{grant, FsSecretStore, Secret, SecretStore};
    pub use crate::transfer::{SessionState, TransferNode, TransferSession};
    pub use crate::version::build_info;
}
