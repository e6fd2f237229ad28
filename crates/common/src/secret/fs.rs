use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::store::{validate_id, SecretStore, SecretStoreError};
use super::Secret;

/// Extension of every secret file inside a store directory
pub const SECRET_FILE_EXTENSION: &str = "toml";

#[derive(thiserror::Error, Debug)]
pub enum FsSecretStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize secret: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("failed to parse secret file {path}: {source}")]
    TomlDe {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A directory of secrets, one TOML file per id
///
/// Files are written to a sibling temp file and renamed into place, so a
/// crash never leaves a half-written secret behind. On unix they are only
/// readable by the owner.
#[derive(Debug, Clone)]
pub struct FsSecretStore {
    dir: PathBuf,
}

impl FsSecretStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, FsSecretStoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, SECRET_FILE_EXTENSION))
    }

    async fn read(&self, path: &Path) -> Result<Secret, FsSecretStoreError> {
        let contents = tokio::fs::read_to_string(path).await?;
        toml::from_str(&contents).map_err(|source| FsSecretStoreError::TomlDe {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn is_not_found(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::NotFound
}

#[async_trait]
impl SecretStore for FsSecretStore {
    type Error = FsSecretStoreError;

    async fn exists(&self, id: &str) -> Result<bool, SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        let exists = tokio::fs::try_exists(self.path(id))
            .await
            .map_err(FsSecretStoreError::from)?;
        Ok(exists)
    }

    async fn load(&self, id: &str) -> Result<Secret, SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        match self.read(&self.path(id)).await {
            Ok(secret) => Ok(secret),
            Err(FsSecretStoreError::Io(e)) if is_not_found(&e) => {
                Err(SecretStoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, id: &str, secret: &Secret) -> Result<(), SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        let contents = toml::to_string_pretty(secret).map_err(FsSecretStoreError::from)?;

        let path = self.path(id);
        let tmp = self.dir.join(format!(".{}.tmp", id));
        write_private(&tmp, contents.as_bytes())
            .await
            .map_err(FsSecretStoreError::from)?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(FsSecretStoreError::from)?;

        tracing::debug!(id, path = %path.display(), "saved secret");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(String, Secret)>, SecretStoreError<Self::Error>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(FsSecretStoreError::from)?;

        let mut secrets = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(FsSecretStoreError::from)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SECRET_FILE_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_id::<FsSecretStoreError>(id).is_err() {
                tracing::warn!(path = %path.display(), "skipping file with invalid secret id");
                continue;
            }
            let secret = self.read(&path).await?;
            secrets.push((id.to_string(), secret));
        }

        secrets.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(secrets)
    }

    async fn delete(&self, id: &str) -> Result<(), SecretStoreError<Self::Error>> {
        validate_id::<Self::Error>(id)?;
        match tokio::fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Err(SecretStoreError::NotFound(id.to_string())),
            Err(e) => Err(FsSecretStoreError::from(e).into()),
        }
    }
}

/// Write `contents` to `path` with owner-only permissions
pub(crate) async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}
