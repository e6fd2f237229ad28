use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("empty transfer payload")]
    Empty,
    #[error("failed to decode transfer payload: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode transfer payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// The single message an initiator sends after a successful handshake
///
/// Serialized as JSON; `secret` has already been granted to the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    #[serde(rename = "secret_id")]
    pub id: String,
    pub secret: Secret,
}

impl TransferPayload {
    pub fn new(id: impl Into<String>, secret: Secret) -> Self {
        Self {
            id: id.into(),
            secret,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        serde_json::to_vec(self).map_err(PayloadError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(PayloadError::Empty);
        }
        serde_json::from_slice(bytes).map_err(PayloadError::Decode)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{Curve, Identity, KeyType};

    #[test]
    fn test_wire_field_names() {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        let secret = Secret::seal("api", &identity.public_key(), b"k").unwrap();
        let payload = TransferPayload::new("abc", secret);

        let value: serde_json::Value = serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap();
        assert_eq!(value["secret_id"], "abc");
        assert_eq!(value["secret"]["name"], "api");
        assert!(value["secret"]["data"].is_string());
        assert!(value["secret"]["created_at"].is_string());

        let back = TransferPayload::from_bytes(&payload.to_bytes().unwrap()).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(
            TransferPayload::from_bytes(b""),
            Err(PayloadError::Empty)
        ));
        assert!(matches!(
            TransferPayload::from_bytes(b" \n"),
            Err(PayloadError::Empty)
        ));
    }

    #[test]
    fn test_wrong_shape() {
        assert!(matches!(
            TransferPayload::from_bytes(br#"{"secret_id": 1}"#),
            Err(PayloadError::Decode(_))
        ));
        assert!(matches!(
            TransferPayload::from_bytes(b"not json"),
            Err(PayloadError::Decode(_))
        ));
    }
}
