//! Cryptographic primitives for secm
//!
//! This module provides the cryptographic foundation for storing and moving
//! secrets:
//!
//! - **Identities**: one private key per profile, either RSA or ECDH over
//!   X25519, P-256, P-384 or P-521
//! - **Envelopes**: hybrid encryption of a secret for one recipient
//! - **Key wrapping**: RSA-OAEP for RSA recipients, ephemeral ECDH plus
//!   AES-256-GCM for EC recipients
//!
//! # Security Model
//!
//! ## Identities
//! An [`Identity`] never leaves the machine it was generated on. Its
//! [`PublicKey`] is what peers exchange, both as PEM and as the raw bytes
//! sent in the transfer handshake.
//!
//! ## Envelope Encryption
//! Every envelope has its own random AES-256-GCM key. Sealing:
//! 1. Draw a fresh 256-bit key and seal the payload under it
//! 2. Wrap the key for the recipient's public key
//! 3. Emit `wrapped_key_len || wrapped_key || nonce || ciphertext`
//!
//! Opening reverses this. A wrong identity and tampered bytes are reported
//! identically as an authentication failure.
//!
//! ## Re-encryption
//! Handing a secret to somebody else means opening the envelope with your
//! own identity and sealing the plaintext again for theirs; see
//! [`crate::secret::grant`].

mod ec;
pub mod envelope;
mod identity;
mod keys;
mod public_key;
mod symmetric;

pub use ec::{EcPublicKey, EcSecretKey};
pub use envelope::{Envelope, EnvelopeError};
pub use identity::{Identity, PRIVATE_KEY_PEM_TAG, RSA_PRIVATE_KEY_PEM_TAG};
pub use keys::{Curve, KeyError, KeyType, DEFAULT_RSA_BITS, MAX_RSA_BITS, MIN_RSA_BITS};
pub use public_key::{PublicKey, PUBLIC_KEY_PEM_TAG};
pub use symmetric::{SymmetricError, SymmetricKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
