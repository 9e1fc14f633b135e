//! Save store: opaque per-session blobs at rest
//!
//! The engine never looks inside a blob; it hands the store whatever the
//! script checkpointed and gives back whatever was loaded.

use async_trait::async_trait;
use cellquest_core::{CoreError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait SaveStore: Send + Sync {
    async fn save(&self, key: &str, blob: &Value) -> Result<()>;

    async fn load(&self, key: &str) -> Result<Option<Value>>;
}

/// One `<key>.json` file per session
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/cellquest/saves`, or `./saves` when the platform has none
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("cellquest").join("saves"))
            .unwrap_or_else(|| PathBuf::from("saves"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsafe save key {:?}", key),
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl SaveStore for FileStore {
    async fn save(&self, key: &str, blob: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(blob)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved {}", path.display());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store for tests and `--no-persist`
#[derive(Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.blobs.lock().await.len()
    }
}

#[async_trait]
impl SaveStore for MemoryStore {
    async fn save(&self, key: &str, blob: &Value) -> Result<()> {
        self.blobs.lock().await.insert(key.to_string(), blob.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.blobs.lock().await.get(key).cloned())
    }
}
