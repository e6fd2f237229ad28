//! Shared helpers for secm integration tests
#![allow(dead_code)]

use std::sync::Once;

use common::crypto::{Curve, Identity, KeyType};

static TRACING: Once = Once::new();

/// Route library logs to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One identity of every supported kind, RSA at the smallest accepted size
pub fn all_identities() -> Vec<Identity> {
    [
        KeyType::Rsa { bits: 2048 },
        KeyType::Ec(Curve::X25519),
        KeyType::Ec(Curve::P256),
        KeyType::Ec(Curve::P384),
        KeyType::Ec(Curve::P521),
    ]
    .into_iter()
    .map(|key_type| Identity::generate(key_type).unwrap())
    .collect()
}

pub fn x25519() -> Identity {
    Identity::generate(KeyType::Ec(Curve::X25519)).unwrap()
}
