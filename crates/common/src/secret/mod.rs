use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{envelope, Envelope, EnvelopeError, Identity, PublicKey};

mod fs;
mod grant;
mod memory;
mod store;

pub use fs::{FsSecretStore, FsSecretStoreError, SECRET_FILE_EXTENSION};
pub use grant::{grant, GrantError};
pub use memory::{MemorySecretStore, MemorySecretStoreError};
pub use store::{validate_id, SecretStore, SecretStoreError, MAX_ID_LEN};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret data is not valid base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
}

/// A stored secret
///
/// `data` holds a base64 [`Envelope`]; everything else is metadata carried
/// along untouched whenever the envelope is re-sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Free-form kind of secret, e.g. `api-key` or `certificate`
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Original format of the plaintext, e.g. `text`, `json` or `binary`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
}

impl Secret {
    /// Wrap an envelope as a new secret created now
    pub fn new(name: impl Into<String>, envelope: &Envelope) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data: STANDARD.encode(envelope.to_bytes()),
            created_at: Utc::now(),
            tags: Vec::new(),
            kind: String::new(),
            format: String::new(),
        }
    }

    /// Seal `plaintext` for `recipient` and wrap it as a new secret
    pub fn seal(
        name: impl Into<String>,
        recipient: &PublicKey,
        plaintext: &[u8],
    ) -> Result<Self, SecretError> {
        let envelope = envelope::encrypt(recipient, plaintext)?;
        Ok(Self::new(name, &envelope))
    }

    /// Decode the stored envelope
    pub fn envelope(&self) -> Result<Envelope, SecretError> {
        let bytes = STANDARD.decode(self.data.as_bytes())?;
        Ok(Envelope::from_bytes(&bytes)?)
    }

    /// Open the stored envelope with `identity`
    pub fn open(&self, identity: &Identity) -> Result<zeroize::Zeroizing<Vec<u8>>, SecretError> {
        Ok(self.envelope()?.open(identity)?)
    }

    /// A copy of this secret carrying a different envelope
    pub fn with_envelope(&self, envelope: &Envelope) -> Self {
        Self {
            data: STANDARD.encode(envelope.to_bytes()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{Curve, KeyType};

    #[test]
    fn test_seal_and_open() {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        let secret = Secret::seal("db-password", &identity.public_key(), b"hunter2").unwrap();
        assert_eq!(&secret.open(&identity).unwrap()[..], b"hunter2");
    }

    #[test]
    fn test_json_field_names() {
        let identity = Identity::generate(KeyType::Ec(Curve::P256)).unwrap();
        let mut secret = Secret::seal("token", &identity.public_key(), b"abc").unwrap();
        secret.kind = "api-key".to_string();
        secret.tags = vec!["prod".to_string()];

        let value = serde_json::to_value(&secret).unwrap();
        assert_eq!(value["type"], "api-key");
        assert_eq!(value["tags"][0], "prod");
        assert!(value.get("description").is_none());
        assert!(value.get("kind").is_none());

        let back: Secret = serde_json::from_value(value).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_bad_base64() {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        let mut secret = Secret::seal("x", &identity.public_key(), b"abc").unwrap();
        secret.data = "***".to_string();
        assert!(matches!(secret.envelope(), Err(SecretError::Encoding(_))));
    }
}
