//! Snapshot Cache - Persistent Key/Value Collaborator
//!
//! Persistent local storage for the last known version and snapshot, read at
//! startup to avoid an empty-tree flash and required to answer "unchanged"
//! fetch responses, which carry no body. The contract is deliberately small:
//! `get(key)` / `set(key, value)` over strings.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryCache`] - ephemeral, for tests and throwaway sessions
//! - [`FileCache`] - one JSON object on disk, the desktop equivalent of the
//!   browser localStorage the protocol was designed around

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Cache key for the last known authoritative version
pub const KEY_BASE_VERSION: &str = "rules_base_version";

/// Cache key for the last known full snapshot (JSON text)
pub const KEY_SNAPSHOT: &str = "rules_snapshot";

/// Cache key for the persisted client identity token
pub const KEY_CLIENT_ID: &str = "client_id";

/// Persistent string key/value storage
///
/// Implementations must be `Send + Sync`. Errors use `anyhow::Result` at
/// this seam; what can go wrong is the backing store's business.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Read a value; `None` when the key has never been set
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Write a value, overwriting any previous one
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// In-memory cache for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed cache: a single JSON object of string entries
///
/// The whole map is rewritten on every `set`; snapshot writes happen once
/// per sync or conflict round, so write volume stays trivial.
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileCache {
    /// Open (or create) a cache file
    ///
    /// A missing file yields an empty cache; a corrupt file is an error so
    /// the caller can decide whether to discard it.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }
}

#[async_trait]
impl SnapshotCache for FileCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        let text = serde_json::to_string(&*entries)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}
