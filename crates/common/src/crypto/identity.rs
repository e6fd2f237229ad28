use pkcs8::PrivateKeyInfo;
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use super::ec::{self, curve_private_key, EcSecretKey};
use super::keys::{
    Curve, KeyError, KeyType, MAX_RSA_BITS, MIN_RSA_BITS, OID_EC_PUBLIC_KEY, OID_ED25519,
    OID_ED448, OID_RSA_ENCRYPTION, OID_X25519, OID_X448,
};
use super::public_key::PublicKey;
use super::symmetric::SymmetricKey;

/// PEM tag for RSA identities (PKCS#1)
pub const RSA_PRIVATE_KEY_PEM_TAG: &str = "RSA PRIVATE KEY";
/// PEM tag for EC identities (PKCS#8)
pub const PRIVATE_KEY_PEM_TAG: &str = "PRIVATE KEY";

/// A loaded or generated private key
///
/// An `Identity` is the only thing that can open envelopes sealed for its
/// [`PublicKey`]. It is read-only once constructed and deliberately not
/// `Clone`; share it behind an `Arc` when several tasks need it.
///
/// # Examples
///
/// ```ignore
/// let identity = Identity::generate(KeyType::Ec(Curve::X25519))?;
/// std::fs::write("identity.key", identity.to_pem()?.as_bytes())?;
///
/// let pem = std::fs::read("identity.key")?;
/// let loaded = Identity::load(&pem)?;
/// assert_eq!(loaded.public_key(), identity.public_key());
/// ```
pub enum Identity {
    Rsa(RsaPrivateKey),
    Ec(EcSecretKey),
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity({})", self.key_type())
    }
}

impl Identity {
    /// Generate a new identity of the requested type
    ///
    /// # Errors
    ///
    /// RSA sizes outside `MIN_RSA_BITS..=MAX_RSA_BITS` are refused with
    /// [`KeyError::WeakRsaKey`].
    pub fn generate(key_type: KeyType) -> Result<Self, KeyError> {
        match key_type {
            KeyType::Rsa { bits } => {
                if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&bits) {
                    return Err(KeyError::WeakRsaKey(bits));
                }
                let key = RsaPrivateKey::new(&mut OsRng, bits)
                    .map_err(|e| anyhow::anyhow!("rsa key generation failed: {}", e))?;
                Ok(Identity::Rsa(key))
            }
            KeyType::Ec(curve) => Ok(Identity::Ec(EcSecretKey::generate(curve)?)),
        }
    }

    /// Load an identity from a PEM block
    ///
    /// The block body is tried as a PKCS#1 RSA private key first, then as
    /// PKCS#8. Within PKCS#8:
    /// - X25519 keys are used as is
    /// - NIST curve keys, whether written for signing or for key agreement,
    ///   become ECDH keys on the same curve
    /// - Ed25519 keys are converted to X25519
    ///
    /// # Errors
    ///
    /// - [`KeyError::CurveConversion`] for a curve with no supported
    ///   Diffie-Hellman mapping
    /// - [`KeyError::KeyParse`] if neither encoding parses
    pub fn load(bytes: &[u8]) -> Result<Self, KeyError> {
        let block = pem::parse(bytes).map_err(|_| KeyError::KeyParse)?;
        let der = Zeroizing::new(block.into_contents());

        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(&der) {
            return Ok(Identity::Rsa(key));
        }

        Self::from_pkcs8_der(&der)
    }

    fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        let info = PrivateKeyInfo::try_from(der).map_err(|_| KeyError::KeyParse)?;
        let oid = info.algorithm.oid;

        if oid == OID_RSA_ENCRYPTION {
            let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|_| KeyError::KeyParse)?;
            return Ok(Identity::Rsa(key));
        }

        if oid == OID_X25519 {
            return EcSecretKey::x25519_from_pkcs8(&info).map(Identity::Ec);
        }

        if oid == OID_ED25519 {
            // same scalar the ed25519 key signs with, so the converted public
            // key matches the birational map of the ed25519 public key
            let seed = curve_private_key(&info)?;
            let signing = ed25519_dalek::SigningKey::from_bytes(&seed);
            let scalar = Zeroizing::new(signing.to_scalar_bytes());
            return Ok(Identity::Ec(EcSecretKey::X25519(StaticSecret::from(*scalar))));
        }

        if oid == OID_EC_PUBLIC_KEY {
            let params = info
                .algorithm
                .parameters_oid()
                .map_err(|_| KeyError::KeyParse)?;
            let curve = Curve::from_parameters_oid(params)
                .ok_or_else(|| KeyError::CurveConversion(params.to_string()))?;
            return EcSecretKey::nist_from_pkcs8(curve, der).map(Identity::Ec);
        }

        if oid == OID_X448 || oid == OID_ED448 {
            return Err(KeyError::CurveConversion(oid.to_string()));
        }

        Err(KeyError::KeyParse)
    }

    /// Encode as PEM: PKCS#1 `RSA PRIVATE KEY` for RSA, PKCS#8 `PRIVATE KEY`
    /// for EC
    pub fn to_pem(&self) -> Result<Zeroizing<String>, KeyError> {
        let block = match self {
            Identity::Rsa(key) => {
                let der = key
                    .to_pkcs1_der()
                    .map_err(|e| anyhow::anyhow!("failed to encode private key: {}", e))?;
                pem::Pem::new(RSA_PRIVATE_KEY_PEM_TAG, der.as_bytes().to_vec())
            }
            Identity::Ec(key) => pem::Pem::new(PRIVATE_KEY_PEM_TAG, key.to_pkcs8_der()?.to_vec()),
        };
        let encoded = Zeroizing::new(pem::encode(&block));
        // the Pem owns a copy of the key bytes; wipe it before it is freed
        let mut contents = block.into_contents();
        zeroize::Zeroize::zeroize(&mut contents);
        Ok(encoded)
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Identity::Rsa(key) => KeyType::Rsa {
                bits: key.size() * 8,
            },
            Identity::Ec(key) => KeyType::Ec(key.curve()),
        }
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            Identity::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            Identity::Ec(key) => PublicKey::Ec(key.public_key()),
        }
    }

    /// Recover a symmetric key wrapped by [`PublicKey::encrypt`]
    ///
    /// # Errors
    ///
    /// Any failure, whether a malformed blob, a wrong key or a corrupted
    /// wrap, is reported as [`KeyError::Decryption`] and nothing else.
    pub fn decrypt(&self, wrapped: &[u8]) -> Result<SymmetricKey, KeyError> {
        match self {
            Identity::Rsa(key) => {
                let raw = key
                    .decrypt(Oaep::new::<Sha256>(), wrapped)
                    .map(Zeroizing::new)
                    .map_err(|_| KeyError::Decryption)?;
                SymmetricKey::from_slice(&raw).map_err(|_| KeyError::Decryption)
            }
            Identity::Ec(key) => ec::unwrap_key(key, wrapped),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pkcs8::der::asn1::OctetStringRef;
    use pkcs8::der::Encode;
    use pkcs8::AlgorithmIdentifierRef;

    fn pkcs8_pem(oid: pkcs8::ObjectIdentifier, seed: &[u8; 32]) -> String {
        let inner = OctetStringRef::new(seed).unwrap().to_der().unwrap();
        let info = PrivateKeyInfo::new(
            AlgorithmIdentifierRef {
                oid,
                parameters: None,
            },
            &inner,
        );
        pem::encode(&pem::Pem::new("PRIVATE KEY", info.to_der().unwrap()))
    }

    #[test]
    fn test_ec_pem_round_trip() {
        for curve in [Curve::X25519, Curve::P256, Curve::P384, Curve::P521] {
            let identity = Identity::generate(KeyType::Ec(curve)).unwrap();
            let pem = identity.to_pem().unwrap();
            assert!(pem.contains("BEGIN PRIVATE KEY"));
            let loaded = Identity::load(pem.as_bytes()).unwrap();
            assert_eq!(loaded.public_key(), identity.public_key());
            assert_eq!(loaded.key_type(), KeyType::Ec(curve));
        }
    }

    #[test]
    fn test_rsa_pem_round_trip() {
        let identity = Identity::generate(KeyType::Rsa { bits: 2048 }).unwrap();
        let pem = identity.to_pem().unwrap();
        assert!(pem.contains("BEGIN RSA PRIVATE KEY"));
        let loaded = Identity::load(pem.as_bytes()).unwrap();
        assert_eq!(loaded.public_key(), identity.public_key());
        assert_eq!(loaded.key_type(), KeyType::Rsa { bits: 2048 });
    }

    #[test]
    fn test_weak_rsa_is_refused() {
        assert!(matches!(
            Identity::generate(KeyType::Rsa { bits: 1024 }),
            Err(KeyError::WeakRsaKey(1024))
        ));
    }

    #[test]
    fn test_ed25519_key_loads_as_x25519() {
        let seed = [3u8; 32];
        let identity = Identity::load(pkcs8_pem(OID_ED25519, &seed).as_bytes()).unwrap();
        assert_eq!(identity.key_type(), KeyType::Ec(Curve::X25519));

        // the converted private key must agree with the converted public key
        let signing = ed25519_dalek::SigningKey::from_bytes(&seed);
        let verifying = signing.verifying_key();
        let spki = spki::SubjectPublicKeyInfoRef {
            algorithm: AlgorithmIdentifierRef {
                oid: OID_ED25519,
                parameters: None,
            },
            subject_public_key: spki::der::asn1::BitStringRef::from_bytes(
                verifying.as_bytes(),
            )
            .unwrap(),
        };
        let public = PublicKey::parse(&spki.to_der().unwrap()).unwrap();
        assert_eq!(identity.public_key(), public);
    }

    #[test]
    fn test_unmapped_curve_is_rejected() {
        let pem = pkcs8_pem(OID_X448, &[1u8; 32]);
        assert!(matches!(
            Identity::load(pem.as_bytes()),
            Err(KeyError::CurveConversion(_))
        ));
    }

    #[test]
    fn test_garbage_fails_to_load() {
        assert!(matches!(
            Identity::load(b"definitely not pem"),
            Err(KeyError::KeyParse)
        ));
        let bogus = pem::encode(&pem::Pem::new("PRIVATE KEY", vec![1, 2, 3]));
        assert!(matches!(
            Identity::load(bogus.as_bytes()),
            Err(KeyError::KeyParse)
        ));
    }

    #[test]
    fn test_decrypt_with_wrong_identity() {
        let alice = Identity::generate(KeyType::Ec(Curve::P256)).unwrap();
        let bob = Identity::generate(KeyType::Ec(Curve::P256)).unwrap();
        let key = SymmetricKey::generate().unwrap();
        let wrapped = alice.public_key().encrypt(&key).unwrap();

        assert_eq!(alice.decrypt(&wrapped).unwrap().bytes(), key.bytes());
        assert!(matches!(bob.decrypt(&wrapped), Err(KeyError::Decryption)));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        assert_eq!(format!("{:?}", identity), "Identity(x25519)");
    }
}
