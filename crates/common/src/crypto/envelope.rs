//! Hybrid envelope encryption
//!
//! A payload is sealed under a fresh AES-256-GCM key, and that key is
//! wrapped for the recipient's public key. The two travel together in one
//! self-describing buffer:
//!
//! ```text
//! [ u32_be wrapped_key_len ][ wrapped_key ][ nonce: 12 ][ ciphertext + tag ]
//! ```
//!
//! Opening never tells the caller *why* it failed beyond
//! [`EnvelopeError::Malformed`] (the buffer cannot be split) and
//! [`EnvelopeError::AuthenticationFailure`] (wrong identity or tampered
//! bytes, indistinguishably).

use bytes::{Buf, BufMut};
use zeroize::Zeroizing;

use super::identity::Identity;
use super::keys::KeyError;
use super::public_key::PublicKey;
use super::symmetric::{random_nonce, SymmetricError, SymmetricKey, NONCE_SIZE};

/// Size of the wrapped-key length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope")]
    Malformed,
    #[error("envelope authentication failed")]
    AuthenticationFailure,
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("symmetric error: {0}")]
    Symmetric(#[from] SymmetricError),
}

/// A parsed hybrid envelope
///
/// Envelopes are immutable once produced; the only ways to get one are
/// [`encrypt`] and [`Envelope::from_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    wrapped_key: Vec<u8>,
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Split an encoded envelope into its parts
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] when the buffer is too short for
    /// the length prefix, or when fewer than `wrapped_key_len + 12` bytes
    /// follow it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let mut buf = bytes;
        if buf.remaining() < LENGTH_PREFIX_SIZE {
            return Err(EnvelopeError::Malformed);
        }
        let wrapped_len = buf.get_u32() as usize;
        let needed = wrapped_len
            .checked_add(NONCE_SIZE)
            .ok_or(EnvelopeError::Malformed)?;
        if buf.remaining() < needed {
            return Err(EnvelopeError::Malformed);
        }

        let wrapped_key = buf[..wrapped_len].to_vec();
        buf.advance(wrapped_len);
        let mut nonce = [0u8; NONCE_SIZE];
        buf.copy_to_slice(&mut nonce);

        Ok(Self {
            wrapped_key,
            nonce,
            ciphertext: buf.to_vec(),
        })
    }

    /// Serialize to the wire layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.put_u32(self.wrapped_key.len() as u32);
        out.put_slice(&self.wrapped_key);
        out.put_slice(&self.nonce);
        out.put_slice(&self.ciphertext);
        out
    }

    pub fn encoded_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.wrapped_key.len() + NONCE_SIZE + self.ciphertext.len()
    }

    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Open this envelope with `identity`
    pub fn open(&self, identity: &Identity) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
        let key = match identity.decrypt(&self.wrapped_key) {
            Ok(key) => key,
            Err(_) => {
                // run the same AEAD work as a real open so a bad wrap and a
                // bad tag cost the same
                let decoy = SymmetricKey::generate()?;
                let _ = decoy.open(&self.nonce, &self.ciphertext);
                return Err(EnvelopeError::AuthenticationFailure);
            }
        };

        key.open(&self.nonce, &self.ciphertext)
            .map_err(|_| EnvelopeError::AuthenticationFailure)
    }
}

/// Seal `plaintext` for `recipient`
///
/// Draws a fresh key and two fresh nonces (one inside the EC wrap) on every
/// call, so sealing the same plaintext twice never yields the same bytes.
pub fn encrypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<Envelope, EnvelopeError> {
    let key = SymmetricKey::generate()?;
    let wrapped_key = recipient.encrypt(&key)?;
    if u32::try_from(wrapped_key.len()).is_err() {
        return Err(EnvelopeError::Malformed);
    }

    let nonce = random_nonce()?;
    let ciphertext = key.seal(&nonce, plaintext)?;

    Ok(Envelope {
        wrapped_key,
        nonce,
        ciphertext,
    })
}

/// Parse an encoded envelope and open it with `identity`
pub fn decrypt(identity: &Identity, bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    Envelope::from_bytes(bytes)?.open(identity)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::keys::{Curve, KeyType};

    #[test]
    fn test_round_trip_x25519() {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        let envelope = encrypt(&identity.public_key(), b"hunter2").unwrap();
        let opened = decrypt(&identity, &envelope.to_bytes()).unwrap();
        assert_eq!(&opened[..], b"hunter2");
    }

    #[test]
    fn test_layout() {
        let identity = Identity::generate(KeyType::Ec(Curve::P256)).unwrap();
        let envelope = encrypt(&identity.public_key(), b"payload").unwrap();
        let bytes = envelope.to_bytes();

        let declared = u32::from_be_bytes(bytes[..4].try_into().unwrap()) as usize;
        assert_eq!(declared, envelope.wrapped_key().len());
        assert_eq!(bytes.len(), envelope.encoded_len());
        assert_eq!(&bytes[4 + declared..4 + declared + NONCE_SIZE], envelope.nonce());
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_short_buffers_are_malformed() {
        for bytes in [
            &[][..],
            &[0u8, 0, 0][..],
            &[0u8, 0, 0, 1][..],
            &[0u8, 0, 0, 0, 1, 2, 3][..],
        ] {
            assert!(matches!(
                Envelope::from_bytes(bytes),
                Err(EnvelopeError::Malformed)
            ));
        }
    }

    #[test]
    fn test_empty_wrapped_key_fails_authentication() {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        let mut bytes = vec![0, 0, 0, 0];
        bytes.extend_from_slice(&[0u8; NONCE_SIZE]);
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            decrypt(&identity, &bytes),
            Err(EnvelopeError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_fresh_ciphertext_each_time() {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        let public = identity.public_key();
        let a = encrypt(&public, b"same").unwrap();
        let b = encrypt(&public, b"same").unwrap();
        assert_ne!(a.to_bytes(), b.to_bytes());
    }
}
