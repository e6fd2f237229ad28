use std::fmt;
use std::str::FromStr;

use pkcs8::ObjectIdentifier;

/// Default RSA modulus size in bits
pub const DEFAULT_RSA_BITS: usize = 2048;
/// Smallest RSA modulus we are willing to generate
pub const MIN_RSA_BITS: usize = 2048;
/// Largest RSA modulus we are willing to generate
pub const MAX_RSA_BITS: usize = 16384;

pub(crate) const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub(crate) const OID_EC_PUBLIC_KEY: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub(crate) const OID_X25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");
pub(crate) const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
pub(crate) const OID_X448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.111");
pub(crate) const OID_ED448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.113");
pub(crate) const OID_SECP256R1: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
pub(crate) const OID_SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
pub(crate) const OID_SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// Errors that can occur while generating, parsing or using keys
///
/// Messages name the operation that failed, never the key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("failed to parse private key")]
    KeyParse,
    #[error("failed to parse public key")]
    PublicKeyParse,
    #[error("no diffie-hellman mapping for curve {0}")]
    CurveConversion(String),
    #[error("rsa key size {0} is outside the allowed range {MIN_RSA_BITS}..={MAX_RSA_BITS}")]
    WeakRsaKey(usize),
    #[error("decryption failed")]
    Decryption,
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Named curves supported for ECDH identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    X25519,
    P256,
    P384,
    P521,
}

impl Curve {
    /// Length of the raw shared secret produced by ECDH on this curve
    pub fn shared_secret_len(&self) -> usize {
        match self {
            Curve::X25519 | Curve::P256 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
        }
    }

    pub(crate) fn from_parameters_oid(oid: ObjectIdentifier) -> Option<Self> {
        if oid == OID_SECP256R1 {
            Some(Curve::P256)
        } else if oid == OID_SECP384R1 {
            Some(Curve::P384)
        } else if oid == OID_SECP521R1 {
            Some(Curve::P521)
        } else {
            None
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Curve::X25519 => "x25519",
            Curve::P256 => "p256",
            Curve::P384 => "p384",
            Curve::P521 => "p521",
        };
        f.write_str(name)
    }
}

/// Selects which kind of identity to generate
///
/// Parses from the names accepted on the command line: `rsa`, `rsa:<bits>`,
/// `x25519` (or its older alias `ec25519`), `p256`, `p384` and `p521`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa { bits: usize },
    Ec(Curve),
}

impl Default for KeyType {
    fn default() -> Self {
        KeyType::Rsa {
            bits: DEFAULT_RSA_BITS,
        }
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let key_type = match normalized.as_str() {
            "rsa" => KeyType::default(),
            "x25519" | "ec25519" => KeyType::Ec(Curve::X25519),
            "p256" | "p-256" => KeyType::Ec(Curve::P256),
            "p384" | "p-384" => KeyType::Ec(Curve::P384),
            "p521" | "p-521" => KeyType::Ec(Curve::P521),
            other => match other.strip_prefix("rsa:") {
                Some(bits) => KeyType::Rsa {
                    bits: bits
                        .parse()
                        .map_err(|_| KeyError::UnsupportedKeyType(s.to_string()))?,
                },
                None => return Err(KeyError::UnsupportedKeyType(s.to_string())),
            },
        };
        Ok(key_type)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Rsa { bits } => write!(f, "rsa:{}", bits),
            KeyType::Ec(curve) => write!(f, "{}", curve),
        }
    }
}

/// Strip PEM armor if present, otherwise hand back the input as DER
pub(crate) fn pem_or_der(bytes: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    match pem::parse(bytes) {
        Ok(block) => std::borrow::Cow::Owned(block.into_contents()),
        Err(_) => std::borrow::Cow::Borrowed(bytes),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_key_types() {
        assert_eq!(
            "rsa".parse::<KeyType>().unwrap(),
            KeyType::Rsa { bits: 2048 }
        );
        assert_eq!(
            "rsa:4096".parse::<KeyType>().unwrap(),
            KeyType::Rsa { bits: 4096 }
        );
        assert_eq!(
            "ec25519".parse::<KeyType>().unwrap(),
            KeyType::Ec(Curve::X25519)
        );
        assert_eq!(
            "X25519".parse::<KeyType>().unwrap(),
            KeyType::Ec(Curve::X25519)
        );
        assert_eq!("p256".parse::<KeyType>().unwrap(), KeyType::Ec(Curve::P256));
        assert_eq!("p384".parse::<KeyType>().unwrap(), KeyType::Ec(Curve::P384));
        assert_eq!("p521".parse::<KeyType>().unwrap(), KeyType::Ec(Curve::P521));
    }

    #[test]
    fn test_unsupported_key_types() {
        for input in ["dsa", "ed448", "secp256k1", "rsa:big", ""] {
            assert!(matches!(
                input.parse::<KeyType>(),
                Err(KeyError::UnsupportedKeyType(_))
            ));
        }
    }

    #[test]
    fn test_display_round_trips() {
        for key_type in [
            KeyType::Rsa { bits: 3072 },
            KeyType::Ec(Curve::X25519),
            KeyType::Ec(Curve::P521),
        ] {
            assert_eq!(key_type.to_string().parse::<KeyType>().unwrap(), key_type);
        }
    }
}
