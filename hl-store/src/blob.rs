//! Blob Storage Backends
//!
//! Durable key-value storage for record blobs and per-scope tip pointers.
//! Blobs are write-once: storing a second blob under an existing key fails
//! with [`StoreError::AttachmentExists`].
//!
//! File layout:
//!
//! ```text
//! <base>/<scope>/genesis.json
//! <base>/<scope>/<hex parent hash>.json
//! <base>/<scope>/tip
//! ```
//!
//! The root scope lives in `<base>/~`.

use async_trait::async_trait;
use hl_core::RecordHash;
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::keys::{scope_dir_name, scope_from_dir_name, AttachmentKey};

const TIP_FILE: &str = "tip";
const BLOB_EXTENSION: &str = "json";

/// Durable record storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob at `key`
    async fn get(&self, scope: &str, key: &AttachmentKey) -> StoreResult<Option<Vec<u8>>>;

    /// Store a new blob; never overwrites
    async fn put_new(&self, scope: &str, key: &AttachmentKey, bytes: &[u8]) -> StoreResult<()>;

    /// Read the scope's tip pointer
    async fn read_tip(&self, scope: &str) -> StoreResult<Option<RecordHash>>;

    /// Move the scope's tip pointer
    async fn write_tip(&self, scope: &str, tip: &RecordHash) -> StoreResult<()>;

    /// Remove a blob the tip never pointed at; missing blobs are ignored
    async fn discard(&self, scope: &str, key: &AttachmentKey) -> StoreResult<()>;

    /// Scopes holding at least one blob or a tip
    async fn list_scopes(&self) -> StoreResult<Vec<String>>;
}

/// Filesystem blob store
pub struct FileBlobStore {
    base_path: PathBuf,
    temp_counter: AtomicU64,
}

impl FileBlobStore {
    /// Open (creating if needed) a store rooted at `base_path`
    pub async fn new(base_path: impl AsRef<Path>) -> StoreResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::Io(format!("Failed to create directory {:?}: {}", base_path, e))
        })?;

        info!("Initialized file blob store at {:?}", base_path);

        Ok(Self {
            base_path,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn scope_path(&self, scope: &str) -> PathBuf {
        self.base_path.join(scope_dir_name(scope))
    }

    fn blob_path(&self, scope: &str, key: &AttachmentKey) -> PathBuf {
        self.scope_path(scope)
            .join(format!("{}.{}", key.storage_name(), BLOB_EXTENSION))
    }

    fn tip_path(&self, scope: &str) -> PathBuf {
        self.scope_path(scope).join(TIP_FILE)
    }

    fn temp_path(&self, scope: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.scope_path(scope)
            .join(format!(".tmp-{}-{}", std::process::id(), n))
    }

    /// Write `bytes` to a fresh temp file in the scope directory and sync it
    async fn write_temp(&self, scope: &str, bytes: &[u8]) -> StoreResult<PathBuf> {
        let dir = self.scope_path(scope);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to create directory {:?}: {}", dir, e)))?;

        let temp = self.temp_path(scope);
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to create file: {}", e)))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to write data: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::Io(format!("Failed to sync file: {}", e)))?;
        Ok(temp)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, scope: &str, key: &AttachmentKey) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(scope, key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!("Failed to read blob {}: {}", key, e))),
        }
    }

    async fn put_new(&self, scope: &str, key: &AttachmentKey, bytes: &[u8]) -> StoreResult<()> {
        let path = self.blob_path(scope, key);
        let temp = self.write_temp(scope, bytes).await?;

        // hard_link refuses to replace an existing file, so the publish is
        // atomic and write-once
        let linked = fs::hard_link(&temp, &path).await;
        let _ = fs::remove_file(&temp).await;
        match linked {
            Ok(()) => {
                debug!(scope = %scope, key = %key, size = bytes.len(), "Blob written");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::AttachmentExists {
                scope: scope.to_string(),
                key: key.storage_name(),
            }),
            Err(e) => Err(StoreError::Io(format!("Failed to publish blob {}: {}", key, e))),
        }
    }

    async fn read_tip(&self, scope: &str) -> StoreResult<Option<RecordHash>> {
        let raw = match fs::read_to_string(self.tip_path(scope)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("Failed to read tip: {}", e))),
        };
        let tip = RecordHash::from_hex(raw.trim())
            .map_err(|e| StoreError::Corrupt(format!("tip of scope '{}': {}", scope, e)))?;
        Ok(Some(tip))
    }

    async fn write_tip(&self, scope: &str, tip: &RecordHash) -> StoreResult<()> {
        let temp = self.write_temp(scope, tip.to_hex().as_bytes()).await?;
        fs::rename(&temp, self.tip_path(scope))
            .await
            .map_err(|e| StoreError::Io(format!("Failed to move tip: {}", e)))?;
        Ok(())
    }

    async fn discard(&self, scope: &str, key: &AttachmentKey) -> StoreResult<()> {
        match fs::remove_file(self.blob_path(scope, key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(format!("Failed to discard blob {}: {}", key, e))),
        }
        if *key == AttachmentKey::Genesis {
            // only succeeds once the directory is empty
            let _ = fs::remove_dir(self.scope_path(scope)).await;
        }
        debug!(scope = %scope, key = %key, "Blob discarded");
        Ok(())
    }

    async fn list_scopes(&self) -> StoreResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to list {:?}: {}", self.base_path, e)))?;

        let mut scopes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(format!("Failed to list scopes: {}", e)))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                scopes.push(scope_from_dir_name(name).to_string());
            }
        }
        scopes.sort();
        Ok(scopes)
    }
}

#[derive(Default)]
struct ScopeBlobs {
    blobs: HashMap<AttachmentKey, Vec<u8>>,
    tip: Option<RecordHash>,
}

/// In-memory blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    scopes: RwLock<BTreeMap<String, ScopeBlobs>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, scope: &str, key: &AttachmentKey) -> StoreResult<Option<Vec<u8>>> {
        let scopes = self.scopes.read().await;
        Ok(scopes.get(scope).and_then(|s| s.blobs.get(key).cloned()))
    }

    async fn put_new(&self, scope: &str, key: &AttachmentKey, bytes: &[u8]) -> StoreResult<()> {
        let mut scopes = self.scopes.write().await;
        let entry = scopes.entry(scope.to_string()).or_default();
        if entry.blobs.contains_key(key) {
            return Err(StoreError::AttachmentExists {
                scope: scope.to_string(),
                key: key.storage_name(),
            });
        }
        entry.blobs.insert(*key, bytes.to_vec());
        Ok(())
    }

    async fn read_tip(&self, scope: &str) -> StoreResult<Option<RecordHash>> {
        let scopes = self.scopes.read().await;
        Ok(scopes.get(scope).and_then(|s| s.tip))
    }

    async fn write_tip(&self, scope: &str, tip: &RecordHash) -> StoreResult<()> {
        let mut scopes = self.scopes.write().await;
        scopes.entry(scope.to_string()).or_default().tip = Some(*tip);
        Ok(())
    }

    async fn discard(&self, scope: &str, key: &AttachmentKey) -> StoreResult<()> {
        let mut scopes = self.scopes.write().await;
        if let Some(entry) = scopes.get_mut(scope) {
            entry.blobs.remove(key);
            if entry.blobs.is_empty() && entry.tip.is_none() {
                scopes.remove(scope);
            }
        }
        Ok(())
    }

    async fn list_scopes(&self) -> StoreResult<Vec<String>> {
        let scopes = self.scopes.read().await;
        Ok(scopes.keys().cloned().collect())
    }
}
