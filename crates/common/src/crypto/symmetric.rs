//! Content encryption using AES-256-GCM
//!
//! Every envelope is sealed under its own freshly drawn `SymmetricKey`. The key
//! never leaves this process in the clear: it is wrapped for a recipient's
//! public key before it is written anywhere, and wiped from memory on drop.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of an AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of an AES-256 key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;
/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Errors that can occur during symmetric sealing or opening
#[derive(Debug, thiserror::Error)]
pub enum SymmetricError {
    #[error("symmetric error: {0}")]
    Default(#[from] anyhow::Error),
    /// Tag verification failed. Covers both a wrong key and tampered bytes.
    #[error("authentication failed")]
    Authentication,
}

/// A 256-bit AES-GCM key, zeroed when dropped
///
/// Sealing never adds associated data; the nonce is carried separately by the
/// caller so that the envelope layout stays in one place.
///
/// # Examples
///
/// ```ignore
/// let key = SymmetricKey::generate()?;
/// let nonce = random_nonce()?;
/// let ciphertext = key.seal(&nonce, b"hunter2")?;
/// let plaintext = key.open(&nonce, &ciphertext)?;
/// assert_eq!(&plaintext[..], b"hunter2");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl From<[u8; KEY_SIZE]> for SymmetricKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        SymmetricKey(bytes)
    }
}

impl SymmetricKey {
    /// Generate a new random key using the operating system RNG
    pub fn generate() -> Result<Self, SymmetricError> {
        let mut buff = [0; KEY_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate key: {}", e))?;
        Ok(Self(buff))
    }

    /// Create a key from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `KEY_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SymmetricError> {
        if data.len() != KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid key size, expected {}, got {}",
                KEY_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; KEY_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.bytes()))
    }

    /// Seal `data` under this key and `nonce`
    ///
    /// The output is the ciphertext with the 16-byte tag appended.
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], data: &[u8]) -> Result<Vec<u8>, SymmetricError> {
        self.cipher()
            .encrypt(Nonce::from_slice(nonce), data)
            .map_err(|_| anyhow::anyhow!("encrypt error").into())
    }

    /// Open `data` sealed under this key and `nonce`
    ///
    /// # Errors
    ///
    /// Returns [`SymmetricError::Authentication`] if the tag does not verify.
    pub fn open(
        &self,
        nonce: &[u8; NONCE_SIZE],
        data: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, SymmetricError> {
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), data)
            .map(Zeroizing::new)
            .map_err(|_| SymmetricError::Authentication)
    }
}

/// Draw a fresh random nonce
pub fn random_nonce() -> Result<[u8; NONCE_SIZE], SymmetricError> {
    let mut nonce = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
    Ok(nonce)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = SymmetricKey::generate().unwrap();
        let nonce = random_nonce().unwrap();
        let data = b"hello world, this is a test message for encryption";

        let sealed = key.seal(&nonce, data).unwrap();
        assert_eq!(sealed.len(), data.len() + TAG_SIZE);

        let opened = key.open(&nonce, &sealed).unwrap();
        assert_eq!(data.as_slice(), opened.as_slice());
    }

    #[test]
    fn test_key_size_validation() {
        assert!(SymmetricKey::from_slice(&[1u8; 16]).is_err());
        assert!(SymmetricKey::from_slice(&[1u8; 64]).is_err());
        assert!(SymmetricKey::from_slice(&[1u8; KEY_SIZE]).is_ok());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SymmetricKey::generate().unwrap();
        let nonce = random_nonce().unwrap();
        let mut sealed = key.seal(&nonce, b"test data for integrity check").unwrap();

        sealed[3] ^= 0xFF;
        assert!(matches!(
            key.open(&nonce, &sealed),
            Err(SymmetricError::Authentication)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = SymmetricKey::generate().unwrap();
        let other = SymmetricKey::generate().unwrap();
        let nonce = random_nonce().unwrap();
        let sealed = key.seal(&nonce, b"secret").unwrap();

        assert!(matches!(
            other.open(&nonce, &sealed),
            Err(SymmetricError::Authentication)
        ));
    }

    #[test]
    fn test_empty_data() {
        let key = SymmetricKey::generate().unwrap();
        let nonce = random_nonce().unwrap();
        let sealed = key.seal(&nonce, b"").unwrap();
        assert_eq!(sealed.len(), TAG_SIZE);
        assert!(key.open(&nonce, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_debug_hides_key() {
        let key = SymmetricKey::from([7u8; KEY_SIZE]);
        assert_eq!(format!("{:?}", key), "SymmetricKey(..)");
    }
}
