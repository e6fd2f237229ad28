use bytes::{Buf, BufMut};

/// Size of each field's big-endian length prefix
const FIELD_HEADER_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("truncated handshake")]
    Truncated,
    #[error("handshake field of {0} bytes is too long")]
    FieldTooLong(usize),
    #[error("{0} unexpected bytes after handshake")]
    TrailingBytes(usize),
}

/// First message on a transfer stream, sent by the receiving peer
///
/// Wire layout:
///
/// ```text
/// u16_be len | identity_public_key | u16_be len | peer_public_key
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The sender's long-term key, in any form `PublicKey::parse` accepts
    pub identity_public_key: Vec<u8>,
    /// Transport key of the node the handshake is addressed to
    pub peer_public_key: Vec<u8>,
}

impl Handshake {
    pub fn new(identity_public_key: Vec<u8>, peer_public_key: Vec<u8>) -> Self {
        Self {
            identity_public_key,
            peer_public_key,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, HandshakeError> {
        let mut out = Vec::with_capacity(
            2 * FIELD_HEADER_SIZE + self.identity_public_key.len() + self.peer_public_key.len(),
        );
        put_field(&mut out, &self.identity_public_key)?;
        put_field(&mut out, &self.peer_public_key)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, HandshakeError> {
        if bytes.len() < 2 * FIELD_HEADER_SIZE {
            return Err(HandshakeError::Truncated);
        }
        let mut buf = bytes;
        let identity_public_key = get_field(&mut buf)?;
        let peer_public_key = get_field(&mut buf)?;
        if buf.has_remaining() {
            return Err(HandshakeError::TrailingBytes(buf.remaining()));
        }
        Ok(Self {
            identity_public_key,
            peer_public_key,
        })
    }
}

fn put_field(out: &mut Vec<u8>, field: &[u8]) -> Result<(), HandshakeError> {
    let len = u16::try_from(field.len()).map_err(|_| HandshakeError::FieldTooLong(field.len()))?;
    out.put_u16(len);
    out.put_slice(field);
    Ok(())
}

fn get_field(buf: &mut &[u8]) -> Result<Vec<u8>, HandshakeError> {
    if buf.remaining() < FIELD_HEADER_SIZE {
        return Err(HandshakeError::Truncated);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(HandshakeError::Truncated);
    }
    let field = buf[..len].to_vec();
    buf.advance(len);
    Ok(field)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_layout() {
        let handshake = Handshake::new(vec![0xaa; 3], vec![0xbb]);
        assert_eq!(
            handshake.encode().unwrap(),
            vec![0, 3, 0xaa, 0xaa, 0xaa, 0, 1, 0xbb]
        );
    }

    #[test]
    fn test_three_bytes_is_truncated() {
        assert_eq!(
            Handshake::decode(&[0, 1, 2]),
            Err(HandshakeError::Truncated)
        );
    }

    #[test]
    fn test_length_past_end_is_truncated() {
        assert_eq!(
            Handshake::decode(&[0, 9, 1, 2, 0, 0]),
            Err(HandshakeError::Truncated)
        );
        // first field fine, second runs past the end
        assert_eq!(
            Handshake::decode(&[0, 1, 7, 0, 4, 1]),
            Err(HandshakeError::Truncated)
        );
    }

    #[test]
    fn test_trailing_bytes() {
        assert_eq!(
            Handshake::decode(&[0, 0, 0, 0, 9]),
            Err(HandshakeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_field_too_long() {
        let handshake = Handshake::new(vec![0; u16::MAX as usize + 1], vec![]);
        assert_eq!(
            handshake.encode(),
            Err(HandshakeError::FieldTooLong(u16::MAX as usize + 1))
        );
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            identity in proptest::collection::vec(any::<u8>(), 0..1024),
            peer in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let handshake = Handshake::new(identity, peer);
            let bytes = handshake.encode().unwrap();
            prop_assert_eq!(Handshake::decode(&bytes).unwrap(), handshake);
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Handshake::decode(&bytes);
        }
    }
}
