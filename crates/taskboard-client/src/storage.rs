//! Durable storage for the session credential.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Trait for credential token storage
///
/// The token is the only state shared across requests: the HTTP adapter
/// reads it at send time, the session writes it on login/signup and clears
/// it on logout or a failed bootstrap.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, if any
    async fn load(&self) -> ClientResult<Option<String>>;

    /// Persist a token, replacing any previous one
    async fn save(&self, token: &str) -> ClientResult<()>;

    /// Erase the persisted token. Clearing an empty store is not an error.
    async fn clear(&self) -> ClientResult<()>;
}

/// In-memory implementation of TokenStore
#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    token: Arc<RwLock<Option<String>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self) -> ClientResult<Option<String>> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &str) -> ClientResult<()> {
        *self.token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> ClientResult<()> {
        self.token.write().await.take();
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

/// File-backed TokenStore, survives process restarts
pub struct FileTokenStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> ClientResult<Option<String>> {
        let _guard = self.lock.read().await;

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ClientError::storage(format!(
                    "Failed to read token file: {e}"
                )));
            }
        };

        match serde_json::from_str::<StoredToken>(&contents) {
            Ok(stored) if !stored.token.is_empty() => Ok(Some(stored.token)),
            Ok(_) => Ok(None),
            Err(e) => {
                // An unreadable file is treated like a missing token
                warn!("Ignoring malformed token file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &str) -> ClientResult<()> {
        let _guard = self.lock.write().await;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ClientError::storage(format!("Failed to create token directory: {e}")))?;
        }

        let contents = serde_json::to_string_pretty(&StoredToken {
            token: token.to_string(),
        })?;

        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| ClientError::storage(format!("Failed to write token file: {e}")))?;

        debug!("Saved token to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> ClientResult<()> {
        let _guard = self.lock.write().await;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Deleted token file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::storage(format!(
                "Failed to delete token file: {e}"
            ))),
        }
    }
}
