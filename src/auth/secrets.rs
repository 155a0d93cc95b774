use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Failure talking to the secret backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum SecretStoreError {
    #[error("secret store failure: {0}")]
    Io(String),
}

/// Opaque get/set/delete of a single named string value.
///
/// No schema beyond "string or absent"; real OS keychain backends live
/// outside this crate and plug in through this trait.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, SecretStoreError>;
    async fn set(&self, name: &str, value: &str) -> Result<(), SecretStoreError>;
    async fn delete(&self, name: &str) -> Result<(), SecretStoreError>;
}

/// Process-local store for tests and embedded hosts
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>, SecretStoreError> {
        Ok(self.values.lock().await.get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        self.values
            .lock()
            .await
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SecretStoreError> {
        self.values.lock().await.remove(name);
        Ok(())
    }
}

/// File-per-secret store under a directory, written atomically via a
/// temporary file and rename.
#[derive(Debug)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn secret_path(&self, name: &str) -> PathBuf {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            })
            .collect();
        self.dir.join(format!("{}.secret", sanitized))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>, SecretStoreError> {
        let path = self.secret_path(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value.trim_end_matches('\n').to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SecretStoreError::Io(format!("read {:?}: {}", path, e))),
        }
    }

    async fn set(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SecretStoreError::Io(format!("create {:?}: {}", self.dir, e)))?;

        let path = self.secret_path(name);
        let tmp = path.with_extension("secret.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| SecretStoreError::Io(format!("write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SecretStoreError::Io(format!("rename {:?}: {}", path, e)))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SecretStoreError> {
        let path = self.secret_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SecretStoreError::Io(format!("delete {:?}: {}", path, e))),
        }
    }
}
