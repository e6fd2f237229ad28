use curve25519_dalek::edwards::CompressedEdwardsY;
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use sha2::{Digest, Sha256};
use spki::SubjectPublicKeyInfoRef;
use x25519_dalek::PublicKey as X25519PublicKey;

use super::ec::{self, EcPublicKey, X25519_KEY_SIZE};
use super::keys::{
    pem_or_der, Curve, KeyError, KeyType, OID_EC_PUBLIC_KEY, OID_ED25519, OID_RSA_ENCRYPTION,
    OID_X25519,
};
use super::symmetric::SymmetricKey;

/// PEM tag used for every public key we emit
pub const PUBLIC_KEY_PEM_TAG: &str = "PUBLIC KEY";

/// The public half of an identity
///
/// Public keys travel between peers: in the transfer handshake as raw
/// bytes, and on disk or on the command line as PEM. The variant set is
/// closed, and every operation dispatches on it.
///
/// # Raw bytes
///
/// [`PublicKey::to_bytes`] produces the canonical form used to identify a
/// peer on the wire:
///
/// - RSA: PKCS#1 `RSAPublicKey` DER
/// - X25519: the 32-byte u-coordinate
/// - P-256, P-384, P-521: the uncompressed SEC1 point
///
/// [`PublicKey::parse`] accepts all of these back, along with PEM or DER
/// `SubjectPublicKeyInfo` documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ec(EcPublicKey),
}

impl From<EcPublicKey> for PublicKey {
    fn from(key: EcPublicKey) -> Self {
        PublicKey::Ec(key)
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        PublicKey::Rsa(key)
    }
}

impl PublicKey {
    /// Parse a public key from PEM, DER or raw point bytes
    ///
    /// Attempts, in order:
    /// 1. `SubjectPublicKeyInfo` (RSA, X25519, NIST curves, and Ed25519
    ///    which is converted to its X25519 equivalent)
    /// 2. PKCS#1 `RSAPublicKey`
    /// 3. a raw point on X25519, P-256, P-384 and P-521
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::PublicKeyParse`] if every attempt fails.
    pub fn parse(bytes: &[u8]) -> Result<Self, KeyError> {
        let der = pem_or_der(bytes);

        if let Ok(key) = Self::from_spki_der(&der) {
            return Ok(key);
        }

        if let Ok(key) = RsaPublicKey::from_pkcs1_der(&der) {
            return Ok(PublicKey::Rsa(key));
        }

        for curve in [Curve::X25519, Curve::P256, Curve::P384, Curve::P521] {
            if let Ok(key) = EcPublicKey::from_raw(curve, &der) {
                return Ok(PublicKey::Ec(key));
            }
        }

        Err(KeyError::PublicKeyParse)
    }

    fn from_spki_der(der: &[u8]) -> Result<Self, KeyError> {
        let spki = SubjectPublicKeyInfoRef::try_from(der).map_err(|_| KeyError::PublicKeyParse)?;
        let oid = spki.algorithm.oid;

        if oid == OID_RSA_ENCRYPTION {
            let key = RsaPublicKey::from_public_key_der(der).map_err(|_| KeyError::PublicKeyParse)?;
            return Ok(PublicKey::Rsa(key));
        }

        if oid == OID_EC_PUBLIC_KEY {
            let curve = spki
                .algorithm
                .parameters_oid()
                .ok()
                .and_then(Curve::from_parameters_oid)
                .ok_or(KeyError::PublicKeyParse)?;
            return EcPublicKey::nist_from_spki(curve, der).map(PublicKey::Ec);
        }

        let raw = spki
            .subject_public_key
            .as_bytes()
            .ok_or(KeyError::PublicKeyParse)?;

        if oid == OID_X25519 {
            return EcPublicKey::from_raw(Curve::X25519, raw).map(PublicKey::Ec);
        }

        if oid == OID_ED25519 {
            return ed25519_to_x25519(raw).map(|key| PublicKey::Ec(EcPublicKey::X25519(key)));
        }

        Err(KeyError::PublicKeyParse)
    }

    /// The key variant this key belongs to
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Rsa(key) => KeyType::Rsa {
                bits: key.size() * 8,
            },
            PublicKey::Ec(key) => KeyType::Ec(key.curve()),
        }
    }

    /// Encode as a DER `SubjectPublicKeyInfo`
    pub fn to_spki_der(&self) -> Result<Vec<u8>, KeyError> {
        match self {
            PublicKey::Rsa(key) => key
                .to_public_key_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| anyhow::anyhow!("failed to encode public key: {}", e).into()),
            PublicKey::Ec(key) => key.to_spki_der(),
        }
    }

    /// Encode as a PEM `PUBLIC KEY` block
    pub fn to_pem(&self) -> Result<String, KeyError> {
        let pem = pem::Pem::new(PUBLIC_KEY_PEM_TAG, self.to_spki_der()?);
        Ok(pem::encode(&pem))
    }

    /// Canonical raw bytes, as exchanged in the transfer handshake
    pub fn to_bytes(&self) -> Result<Vec<u8>, KeyError> {
        match self {
            PublicKey::Rsa(key) => key
                .to_pkcs1_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| anyhow::anyhow!("failed to encode public key: {}", e).into()),
            PublicKey::Ec(key) => Ok(key.to_bytes()),
        }
    }

    /// Hex SHA-256 of the canonical raw bytes
    pub fn fingerprint(&self) -> Result<String, KeyError> {
        Ok(hex::encode(Sha256::digest(self.to_bytes()?)))
    }

    /// Wrap a symmetric key so only the matching identity can recover it
    ///
    /// RSA keys encrypt directly with OAEP-SHA256. EC keys use an ephemeral
    /// ECDH exchange; see [`super::ec`] for the nested layout.
    pub fn encrypt(&self, key: &SymmetricKey) -> Result<Vec<u8>, KeyError> {
        match self {
            PublicKey::Rsa(rsa) => rsa
                .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.bytes())
                .map_err(|e| anyhow::anyhow!("rsa encryption failed: {}", e).into()),
            PublicKey::Ec(ec) => ec::wrap_key(ec, key),
        }
    }
}

/// Map an Ed25519 public key onto the Montgomery curve
fn ed25519_to_x25519(bytes: &[u8]) -> Result<X25519PublicKey, KeyError> {
    let bytes: [u8; X25519_KEY_SIZE] = bytes.try_into().map_err(|_| KeyError::PublicKeyParse)?;
    let edwards_point = CompressedEdwardsY(bytes)
        .decompress()
        .ok_or(KeyError::PublicKeyParse)?;
    Ok(X25519PublicKey::from(edwards_point.to_montgomery().to_bytes()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::ec::EcSecretKey;

    #[test]
    fn test_raw_bytes_round_trip() {
        for curve in [Curve::X25519, Curve::P256, Curve::P384, Curve::P521] {
            let public = PublicKey::Ec(EcSecretKey::generate(curve).unwrap().public_key());
            let recovered = PublicKey::parse(&public.to_bytes().unwrap()).unwrap();
            assert_eq!(recovered, public);
        }
    }

    #[test]
    fn test_pem_round_trip() {
        for curve in [Curve::X25519, Curve::P256, Curve::P384, Curve::P521] {
            let public = PublicKey::Ec(EcSecretKey::generate(curve).unwrap().public_key());
            let pem = public.to_pem().unwrap();
            assert!(pem.contains("BEGIN PUBLIC KEY"));
            assert_eq!(PublicKey::parse(pem.as_bytes()).unwrap(), public);
        }
    }

    #[test]
    fn test_ed25519_spki_converts_to_x25519() {
        let signing = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
        let verifying = signing.verifying_key();

        let spki = SubjectPublicKeyInfoRef {
            algorithm: pkcs8::AlgorithmIdentifierRef {
                oid: OID_ED25519,
                parameters: None,
            },
            subject_public_key: spki::der::asn1::BitStringRef::from_bytes(verifying.as_bytes())
                .unwrap(),
        };
        let der = spki::der::Encode::to_der(&spki).unwrap();

        let parsed = PublicKey::parse(&der).unwrap();
        let expected = X25519PublicKey::from(&x25519_dalek::StaticSecret::from(
            signing.to_scalar_bytes(),
        ));
        assert_eq!(parsed, PublicKey::Ec(EcPublicKey::X25519(expected)));
    }

    #[test]
    fn test_garbage_fails() {
        for input in [&b""[..], b"not a key", &[0u8; 31], &[4u8; 65]] {
            assert!(matches!(
                PublicKey::parse(input),
                Err(KeyError::PublicKeyParse)
            ));
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let public = PublicKey::Ec(EcSecretKey::generate(Curve::P256).unwrap().public_key());
        let first = public.fingerprint().unwrap();
        let reparsed = PublicKey::parse(&public.to_bytes().unwrap()).unwrap();
        assert_eq!(first, reparsed.fingerprint().unwrap());
        assert_eq!(first.len(), 64);
    }
}
