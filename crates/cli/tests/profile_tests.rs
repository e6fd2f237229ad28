//! Profiles on disk, exercised through the library half of the CLI

use common::crypto::{Curve, KeyType};
use common::secret::{grant, Secret, SecretStore};
use secm_cli::state::{AppState, Config, TransferConfig};

#[tokio::test]
async fn test_secret_survives_reload() {
    let temp = tempfile::tempdir().unwrap();
    let root = Some(temp.path().to_path_buf());

    let state = AppState::init(root.clone(), "default", KeyType::Ec(Curve::P384), None).unwrap();
    let identity = state.load_identity().unwrap();
    let store = state.secret_store().await.unwrap();
    let secret = Secret::seal("token", &identity.public_key(), b"abc123").unwrap();
    store.save("token", &secret).await.unwrap();

    let reloaded = AppState::load(root, "default").unwrap();
    let identity = reloaded.load_identity().unwrap();
    let stored = reloaded.secret_store().await.unwrap().load("token").await.unwrap();
    assert_eq!(&stored.open(&identity).unwrap()[..], b"abc123");
}

#[tokio::test]
async fn test_grant_between_profiles() {
    let temp = tempfile::tempdir().unwrap();
    let root = Some(temp.path().to_path_buf());

    let alice = AppState::init(root.clone(), "alice", KeyType::Ec(Curve::P256), None).unwrap();
    let bob = AppState::init(root, "bob", KeyType::Ec(Curve::X25519), None).unwrap();
    let alice_id = alice.load_identity().unwrap();
    let bob_id = bob.load_identity().unwrap();

    let secret = Secret::seal("api", &alice_id.public_key(), b"key").unwrap();
    let granted = grant(&alice_id, &bob_id.public_key(), &secret).unwrap();

    let bob_store = bob.secret_store().await.unwrap();
    bob_store.save("api", &granted).await.unwrap();
    assert_eq!(&bob_store.load("api").await.unwrap().open(&bob_id).unwrap()[..], b"key");
    assert!(alice.secret_store().await.unwrap().list().await.unwrap().is_empty());
}

#[test]
fn test_custom_config_is_written() {
    let temp = tempfile::tempdir().unwrap();
    let root = Some(temp.path().to_path_buf());
    let config = Config {
        log_level: "debug".to_string(),
        log_dir: None,
        transfer: TransferConfig {
            timeout_secs: 60,
            port: 4433,
            overwrite: true,
        },
    };

    AppState::init(root.clone(), "default", KeyType::Ec(Curve::X25519), Some(config.clone()))
        .unwrap();
    assert_eq!(AppState::load(root, "default").unwrap().config, config);
}
