//! Elliptic-curve Diffie-Hellman keys and the ephemeral key wrap
//!
//! An EC public key cannot encrypt directly, so a symmetric key is wrapped
//! for an EC recipient by generating an ephemeral key pair on the
//! recipient's curve, deriving a shared secret with ECDH, and sealing the
//! symmetric key under that secret:
//!
//! ```text
//! [ u32_be spki_len ][ ephemeral public key, SPKI DER ][ nonce: 12 ][ sealed key + tag ]
//! ```
//!
//! X25519 and P-256 produce 32-byte shared secrets which key AES-256-GCM
//! directly. P-384 and P-521 secrets are reduced to 32 bytes with
//! HKDF-SHA256.

use bytes::{Buf, BufMut};
use hkdf::Hkdf;
use pkcs8::der::asn1::{BitStringRef, OctetStringRef};
use pkcs8::der::{Decode, Encode};
use pkcs8::{AlgorithmIdentifierRef, DecodePrivateKey, EncodePrivateKey, PrivateKeyInfo};
use rand_core::OsRng;
use sha2::Sha256;
use spki::{DecodePublicKey, EncodePublicKey, SubjectPublicKeyInfoRef};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use p256::elliptic_curve::sec1::ToEncodedPoint;

use super::keys::{Curve, KeyError, OID_X25519};
use super::symmetric::{random_nonce, SymmetricKey, KEY_SIZE, NONCE_SIZE};

/// HKDF info string for curves whose shared secret is longer than a key
const KEK_INFO: &[u8] = b"secm/ec-wrap/v1";
/// Raw X25519 key length
pub const X25519_KEY_SIZE: usize = 32;

/// Private half of an ECDH key on one of the supported curves
#[derive(Clone)]
pub enum EcSecretKey {
    X25519(StaticSecret),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

/// Public half of an ECDH key on one of the supported curves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcPublicKey {
    X25519(X25519PublicKey),
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
}

impl std::fmt::Debug for EcSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EcSecretKey({})", self.curve())
    }
}

impl EcSecretKey {
    /// Generate a fresh key pair on `curve`
    pub fn generate(curve: Curve) -> Result<Self, KeyError> {
        let key = match curve {
            Curve::X25519 => {
                let mut bytes = Zeroizing::new([0u8; X25519_KEY_SIZE]);
                getrandom::getrandom(&mut bytes[..])
                    .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
                EcSecretKey::X25519(StaticSecret::from(*bytes))
            }
            Curve::P256 => EcSecretKey::P256(p256::SecretKey::random(&mut OsRng)),
            Curve::P384 => EcSecretKey::P384(p384::SecretKey::random(&mut OsRng)),
            Curve::P521 => EcSecretKey::P521(p521::SecretKey::random(&mut OsRng)),
        };
        Ok(key)
    }

    pub fn curve(&self) -> Curve {
        match self {
            EcSecretKey::X25519(_) => Curve::X25519,
            EcSecretKey::P256(_) => Curve::P256,
            EcSecretKey::P384(_) => Curve::P384,
            EcSecretKey::P521(_) => Curve::P521,
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        match self {
            EcSecretKey::X25519(sk) => EcPublicKey::X25519(X25519PublicKey::from(sk)),
            EcSecretKey::P256(sk) => EcPublicKey::P256(sk.public_key()),
            EcSecretKey::P384(sk) => EcPublicKey::P384(sk.public_key()),
            EcSecretKey::P521(sk) => EcPublicKey::P521(sk.public_key()),
        }
    }

    /// Read an X25519 private key from the body of a PKCS#8 document
    pub(crate) fn x25519_from_pkcs8(info: &PrivateKeyInfo<'_>) -> Result<Self, KeyError> {
        let bytes = curve_private_key(info)?;
        Ok(EcSecretKey::X25519(StaticSecret::from(*bytes)))
    }

    /// Read a NIST curve private key from a PKCS#8 document
    pub(crate) fn nist_from_pkcs8(curve: Curve, der: &[u8]) -> Result<Self, KeyError> {
        let key = match curve {
            Curve::P256 => p256::SecretKey::from_pkcs8_der(der).map(EcSecretKey::P256),
            Curve::P384 => p384::SecretKey::from_pkcs8_der(der).map(EcSecretKey::P384),
            Curve::P521 => p521::SecretKey::from_pkcs8_der(der).map(EcSecretKey::P521),
            Curve::X25519 => return Err(KeyError::KeyParse),
        };
        key.map_err(|_| KeyError::KeyParse)
    }

    /// Encode as a PKCS#8 `PrivateKeyInfo` document
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let der = match self {
            EcSecretKey::X25519(sk) => {
                let secret = Zeroizing::new(sk.to_bytes());
                let inner = OctetStringRef::new(&secret[..])
                    .and_then(|octets| octets.to_der())
                    .map(Zeroizing::new)
                    .map_err(|e| anyhow::anyhow!("failed to encode x25519 key: {}", e))?;
                let info = PrivateKeyInfo::new(
                    AlgorithmIdentifierRef {
                        oid: OID_X25519,
                        parameters: None,
                    },
                    inner.as_slice(),
                );
                info.to_der()
                    .map_err(|e| anyhow::anyhow!("failed to encode x25519 key: {}", e))?
            }
            EcSecretKey::P256(sk) => nist_pkcs8(sk.to_pkcs8_der())?,
            EcSecretKey::P384(sk) => nist_pkcs8(sk.to_pkcs8_der())?,
            EcSecretKey::P521(sk) => nist_pkcs8(sk.to_pkcs8_der())?,
        };
        Ok(Zeroizing::new(der))
    }

    /// Derive the raw ECDH shared secret with `peer`
    ///
    /// Both keys must be on the same curve. A mismatch is a caller bug and
    /// is reported rather than coerced.
    pub fn diffie_hellman(&self, peer: &EcPublicKey) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let shared = match (self, peer) {
            (EcSecretKey::X25519(sk), EcPublicKey::X25519(pk)) => {
                let shared = sk.diffie_hellman(pk);
                if !shared.was_contributory() {
                    return Err(anyhow::anyhow!("non-contributory x25519 shared secret").into());
                }
                shared.as_bytes().to_vec()
            }
            (EcSecretKey::P256(sk), EcPublicKey::P256(pk)) => {
                p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            (EcSecretKey::P384(sk), EcPublicKey::P384(pk)) => {
                p384::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            (EcSecretKey::P521(sk), EcPublicKey::P521(pk)) => {
                p521::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            (sk, pk) => {
                return Err(anyhow::anyhow!(
                    "curve mismatch: {} key cannot agree with {} key",
                    sk.curve(),
                    pk.curve()
                )
                .into())
            }
        };
        Ok(Zeroizing::new(shared))
    }
}

impl EcPublicKey {
    pub fn curve(&self) -> Curve {
        match self {
            EcPublicKey::X25519(_) => Curve::X25519,
            EcPublicKey::P256(_) => Curve::P256,
            EcPublicKey::P384(_) => Curve::P384,
            EcPublicKey::P521(_) => Curve::P521,
        }
    }

    /// Canonical raw bytes: the 32-byte u-coordinate for X25519, the
    /// uncompressed SEC1 point for the NIST curves
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            EcPublicKey::X25519(pk) => pk.as_bytes().to_vec(),
            EcPublicKey::P256(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
            EcPublicKey::P384(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
            EcPublicKey::P521(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Interpret `bytes` as a raw point on `curve`
    pub fn from_raw(curve: Curve, bytes: &[u8]) -> Result<Self, KeyError> {
        let key = match curve {
            Curve::X25519 => {
                let raw: [u8; X25519_KEY_SIZE] =
                    bytes.try_into().map_err(|_| KeyError::PublicKeyParse)?;
                EcPublicKey::X25519(X25519PublicKey::from(raw))
            }
            Curve::P256 => p256::PublicKey::from_sec1_bytes(bytes)
                .map(EcPublicKey::P256)
                .map_err(|_| KeyError::PublicKeyParse)?,
            Curve::P384 => p384::PublicKey::from_sec1_bytes(bytes)
                .map(EcPublicKey::P384)
                .map_err(|_| KeyError::PublicKeyParse)?,
            Curve::P521 => p521::PublicKey::from_sec1_bytes(bytes)
                .map(EcPublicKey::P521)
                .map_err(|_| KeyError::PublicKeyParse)?,
        };
        Ok(key)
    }

    /// Read a NIST curve public key from an SPKI document
    pub(crate) fn nist_from_spki(curve: Curve, der: &[u8]) -> Result<Self, KeyError> {
        let key = match curve {
            Curve::P256 => p256::PublicKey::from_public_key_der(der).map(EcPublicKey::P256),
            Curve::P384 => p384::PublicKey::from_public_key_der(der).map(EcPublicKey::P384),
            Curve::P521 => p521::PublicKey::from_public_key_der(der).map(EcPublicKey::P521),
            Curve::X25519 => return Err(KeyError::PublicKeyParse),
        };
        key.map_err(|_| KeyError::PublicKeyParse)
    }

    /// Encode as a DER `SubjectPublicKeyInfo`
    pub fn to_spki_der(&self) -> Result<Vec<u8>, KeyError> {
        let der = match self {
            EcPublicKey::X25519(pk) => {
                let spki = SubjectPublicKeyInfoRef {
                    algorithm: AlgorithmIdentifierRef {
                        oid: OID_X25519,
                        parameters: None,
                    },
                    subject_public_key: BitStringRef::from_bytes(pk.as_bytes())
                        .map_err(|e| anyhow::anyhow!("failed to encode x25519 key: {}", e))?,
                };
                spki.to_der()
                    .map_err(|e| anyhow::anyhow!("failed to encode x25519 key: {}", e))?
            }
            EcPublicKey::P256(pk) => nist_spki(pk.to_public_key_der())?,
            EcPublicKey::P384(pk) => nist_spki(pk.to_public_key_der())?,
            EcPublicKey::P521(pk) => nist_spki(pk.to_public_key_der())?,
        };
        Ok(der)
    }
}

fn nist_pkcs8(doc: pkcs8::Result<pkcs8::SecretDocument>) -> Result<Vec<u8>, KeyError> {
    let doc = doc.map_err(|e| anyhow::anyhow!("failed to encode private key: {}", e))?;
    Ok(doc.as_bytes().to_vec())
}

fn nist_spki(doc: spki::Result<spki::Document>) -> Result<Vec<u8>, KeyError> {
    let doc = doc.map_err(|e| anyhow::anyhow!("failed to encode public key: {}", e))?;
    Ok(doc.as_bytes().to_vec())
}

/// Unpack the `CurvePrivateKey` octet string carried by X25519 and Ed25519
/// PKCS#8 documents
pub(crate) fn curve_private_key(
    info: &PrivateKeyInfo<'_>,
) -> Result<Zeroizing<[u8; X25519_KEY_SIZE]>, KeyError> {
    let octets = OctetStringRef::from_der(info.private_key).map_err(|_| KeyError::KeyParse)?;
    let bytes: [u8; X25519_KEY_SIZE] = octets
        .as_bytes()
        .try_into()
        .map_err(|_| KeyError::KeyParse)?;
    Ok(Zeroizing::new(bytes))
}

/// Turn an ECDH shared secret into an AES-256 key
fn key_encryption_key(shared: &[u8]) -> Result<SymmetricKey, KeyError> {
    if shared.len() == KEY_SIZE {
        return SymmetricKey::from_slice(shared).map_err(|e| anyhow::anyhow!("{}", e).into());
    }
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    Hkdf::<Sha256>::new(None, shared)
        .expand(KEK_INFO, &mut okm[..])
        .map_err(|_| anyhow::anyhow!("hkdf expand failed"))?;
    Ok(SymmetricKey::from(*okm))
}

/// Wrap `key` for `recipient` using an ephemeral key pair on its curve
pub(crate) fn wrap_key(recipient: &EcPublicKey, key: &SymmetricKey) -> Result<Vec<u8>, KeyError> {
    let ephemeral = EcSecretKey::generate(recipient.curve())?;
    let shared = ephemeral.diffie_hellman(recipient)?;
    let kek = key_encryption_key(&shared)?;

    let nonce = random_nonce().map_err(|e| anyhow::anyhow!("{}", e))?;
    let sealed = kek
        .seal(&nonce, key.bytes())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let ephemeral_public = ephemeral.public_key().to_spki_der()?;
    let ephemeral_len = u32::try_from(ephemeral_public.len())
        .map_err(|_| anyhow::anyhow!("ephemeral public key too large"))?;

    let mut out = Vec::with_capacity(4 + ephemeral_public.len() + NONCE_SIZE + sealed.len());
    out.put_u32(ephemeral_len);
    out.put_slice(&ephemeral_public);
    out.put_slice(&nonce);
    out.put_slice(&sealed);
    Ok(out)
}

/// Recover a key wrapped by [`wrap_key`]
///
/// Every failure, structural or cryptographic, collapses into
/// [`KeyError::Decryption`].
pub(crate) fn unwrap_key(identity: &EcSecretKey, wrapped: &[u8]) -> Result<SymmetricKey, KeyError> {
    let mut buf = wrapped;
    if buf.remaining() < 4 {
        return Err(KeyError::Decryption);
    }
    let ephemeral_len = buf.get_u32() as usize;
    if buf.remaining() < ephemeral_len.saturating_add(NONCE_SIZE) {
        return Err(KeyError::Decryption);
    }
    let ephemeral_der = &buf[..ephemeral_len];
    buf.advance(ephemeral_len);
    let mut nonce = [0u8; NONCE_SIZE];
    buf.copy_to_slice(&mut nonce);
    let sealed = buf;

    let ephemeral = ephemeral_from_spki(identity.curve(), ephemeral_der)?;
    let shared = identity
        .diffie_hellman(&ephemeral)
        .map_err(|_| KeyError::Decryption)?;
    let kek = key_encryption_key(&shared).map_err(|_| KeyError::Decryption)?;
    let key = kek.open(&nonce, sealed).map_err(|_| KeyError::Decryption)?;
    SymmetricKey::from_slice(&key).map_err(|_| KeyError::Decryption)
}

fn ephemeral_from_spki(curve: Curve, der: &[u8]) -> Result<EcPublicKey, KeyError> {
    match curve {
        Curve::X25519 => {
            let spki = SubjectPublicKeyInfoRef::try_from(der).map_err(|_| KeyError::Decryption)?;
            if spki.algorithm.oid != OID_X25519 {
                return Err(KeyError::Decryption);
            }
            let raw = spki
                .subject_public_key
                .as_bytes()
                .ok_or(KeyError::Decryption)?;
            EcPublicKey::from_raw(Curve::X25519, raw).map_err(|_| KeyError::Decryption)
        }
        nist => EcPublicKey::nist_from_spki(nist, der).map_err(|_| KeyError::Decryption),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CURVES: [Curve; 4] = [Curve::X25519, Curve::P256, Curve::P384, Curve::P521];

    #[test]
    fn test_diffie_hellman_agrees() {
        for curve in CURVES {
            let alice = EcSecretKey::generate(curve).unwrap();
            let bob = EcSecretKey::generate(curve).unwrap();
            let ab = alice.diffie_hellman(&bob.public_key()).unwrap();
            let ba = bob.diffie_hellman(&alice.public_key()).unwrap();
            assert_eq!(*ab, *ba);
            assert_eq!(ab.len(), curve.shared_secret_len());
        }
    }

    #[test]
    fn test_curve_mismatch_is_rejected() {
        let alice = EcSecretKey::generate(Curve::P256).unwrap();
        let bob = EcSecretKey::generate(Curve::P384).unwrap();
        assert!(alice.diffie_hellman(&bob.public_key()).is_err());
    }

    #[test]
    fn test_low_order_x25519_point_is_rejected() {
        let alice = EcSecretKey::generate(Curve::X25519).unwrap();
        let zero = EcPublicKey::X25519(X25519PublicKey::from([0u8; 32]));
        assert!(alice.diffie_hellman(&zero).is_err());
    }

    #[test]
    fn test_wrap_unwrap() {
        for curve in CURVES {
            let recipient = EcSecretKey::generate(curve).unwrap();
            let key = SymmetricKey::generate().unwrap();
            let wrapped = wrap_key(&recipient.public_key(), &key).unwrap();
            let unwrapped = unwrap_key(&recipient, &wrapped).unwrap();
            assert_eq!(key.bytes(), unwrapped.bytes());
        }
    }

    #[test]
    fn test_unwrap_with_wrong_key_fails() {
        let recipient = EcSecretKey::generate(Curve::X25519).unwrap();
        let other = EcSecretKey::generate(Curve::X25519).unwrap();
        let key = SymmetricKey::generate().unwrap();
        let wrapped = wrap_key(&recipient.public_key(), &key).unwrap();
        assert!(matches!(
            unwrap_key(&other, &wrapped),
            Err(KeyError::Decryption)
        ));
    }

    #[test]
    fn test_unwrap_truncated_fails() {
        let recipient = EcSecretKey::generate(Curve::P256).unwrap();
        let key = SymmetricKey::generate().unwrap();
        let wrapped = wrap_key(&recipient.public_key(), &key).unwrap();
        for len in [0, 3, 4, 20, wrapped.len() - 1] {
            assert!(matches!(
                unwrap_key(&recipient, &wrapped[..len]),
                Err(KeyError::Decryption)
            ));
        }
        let mut oversized = wrapped.clone();
        oversized[..4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            unwrap_key(&recipient, &oversized),
            Err(KeyError::Decryption)
        ));
    }

    #[test]
    fn test_raw_bytes_round_trip() {
        for curve in CURVES {
            let public = EcSecretKey::generate(curve).unwrap().public_key();
            let raw = public.to_bytes();
            assert_eq!(EcPublicKey::from_raw(curve, &raw).unwrap(), public);
        }
    }

    #[test]
    fn test_pkcs8_round_trip() {
        for curve in CURVES {
            let secret = EcSecretKey::generate(curve).unwrap();
            let der = secret.to_pkcs8_der().unwrap();
            let info = PrivateKeyInfo::try_from(der.as_slice()).unwrap();
            let recovered = match curve {
                Curve::X25519 => EcSecretKey::x25519_from_pkcs8(&info).unwrap(),
                nist => EcSecretKey::nist_from_pkcs8(nist, &der).unwrap(),
            };
            assert_eq!(recovered.public_key(), secret.public_key());
        }
    }
}
