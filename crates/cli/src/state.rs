use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use common::crypto::{Identity, KeyType};
use common::secret::{validate_id, FsSecretStore, FsSecretStoreError};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "secm";
pub const DEFAULT_PROFILE: &str = "default";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "identity.key";
pub const SECRETS_DIR_NAME: &str = "secrets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs to a daily rolling file in this directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Upper bound on a whole transfer session
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Port the transfer node binds, 0 for any
    #[serde(default)]
    pub port: u16,
    /// Whether a received secret may replace one with the same id
    #[serde(default)]
    pub overwrite: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
            transfer: TransferConfig::default(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            port: 0,
            overwrite: false,
        }
    }
}

/// A profile's directory on disk
///
/// ```text
/// ~/.secm/<profile>/
///   identity.key    private key PEM, owner-only
///   config.toml
///   secrets/        one TOML file per secret
/// ```
#[derive(Debug, Clone)]
pub struct AppState {
    pub profile: String,
    pub profile_dir: PathBuf,
    pub key_path: PathBuf,
    pub secrets_path: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
}

impl AppState {
    /// Get the root directory holding every profile (custom or default ~/.secm)
    pub fn root_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    pub fn profile_dir(custom_path: Option<PathBuf>, profile: &str) -> Result<PathBuf, StateError> {
        validate_id::<std::convert::Infallible>(profile)
            .map_err(|_| StateError::InvalidProfile(profile.to_string()))?;
        Ok(Self::root_dir(custom_path)?.join(profile))
    }

    /// Create a profile with a fresh identity of `key_type`
    pub fn init(
        custom_path: Option<PathBuf>,
        profile: &str,
        key_type: KeyType,
        config: Option<Config>,
    ) -> Result<Self, StateError> {
        let profile_dir = Self::profile_dir(custom_path, profile)?;
        let key_path = profile_dir.join(KEY_FILE_NAME);
        if key_path.exists() {
            return Err(StateError::AlreadyInitialized(profile.to_string()));
        }

        create_private_dir(&profile_dir)?;
        let secrets_path = profile_dir.join(SECRETS_DIR_NAME);
        create_private_dir(&secrets_path)?;

        let identity = Identity::generate(key_type)
            .map_err(|e| StateError::InvalidKey(e.to_string()))?;
        let pem = identity
            .to_pem()
            .map_err(|e| StateError::InvalidKey(e.to_string()))?;
        write_private(&key_path, pem.as_bytes())?;

        let config = config.unwrap_or_default();
        let config_path = profile_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        Ok(Self {
            profile: profile.to_string(),
            profile_dir,
            key_path,
            secrets_path,
            config_path,
            config,
        })
    }

    /// Load an existing profile
    pub fn load(custom_path: Option<PathBuf>, profile: &str) -> Result<Self, StateError> {
        let profile_dir = Self::profile_dir(custom_path, profile)?;
        if !profile_dir.exists() {
            return Err(StateError::NotInitialized(profile.to_string()));
        }

        let key_path = profile_dir.join(KEY_FILE_NAME);
        let secrets_path = profile_dir.join(SECRETS_DIR_NAME);
        let config_path = profile_dir.join(CONFIG_FILE_NAME);

        if !key_path.exists() {
            return Err(StateError::MissingFile(KEY_FILE_NAME.to_string()));
        }
        if !secrets_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", SECRETS_DIR_NAME)));
        }
        // a profile from before config.toml existed runs on defaults
        let config = if config_path.exists() {
            toml::from_str(&fs::read_to_string(&config_path)?)?
        } else {
            Config::default()
        };

        Ok(Self {
            profile: profile.to_string(),
            profile_dir,
            key_path,
            secrets_path,
            config_path,
            config,
        })
    }

    pub fn load_identity(&self) -> Result<Identity, StateError> {
        let pem = fs::read(&self.key_path)?;
        Identity::load(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))
    }

    pub async fn secret_store(&self) -> Result<FsSecretStore, StateError> {
        Ok(FsSecretStore::open(&self.secrets_path).await?)
    }
}

fn create_private_dir(path: &Path) -> Result<(), StateError> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Write a file only the owner can read
pub fn write_private(path: &Path, contents: &[u8]) -> Result<(), StateError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("profile {0:?} not initialized. Run 'secm init' first")]
    NotInitialized(String),

    #[error("profile {0:?} already initialized, use --profile to create another")]
    AlreadyInitialized(String),

    #[error("invalid profile name: {0:?}")]
    InvalidProfile(String),

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("secret store error: {0}")]
    Store(#[from] FsSecretStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
