//! Scope chains
//!
//! Each scope is a singly-linked list of sealed records persisted in a
//! [`BlobStore`]. Appending writes the immutable blob first and moves the tip
//! second; a crash between the two leaves a blob past the tip, which the
//! bootstrap rebuild detects and repairs.

use std::collections::HashSet;
use std::sync::Arc;

use hl_core::{Record, RecordHash};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::blob::BlobStore;
use crate::error::{StoreError, StoreResult};
use crate::keys::AttachmentKey;

/// Summary of one scope's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeChain {
    pub scope_name: String,
    pub tip_hash: RecordHash,
    pub genesis_hash: RecordHash,
}

/// Chain persistence over a blob store
#[derive(Clone)]
pub struct ChainStore {
    blobs: Arc<dyn BlobStore>,
}

impl ChainStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Current tip of a scope
    pub async fn get_tip(&self, scope: &str) -> StoreResult<RecordHash> {
        self.tip(scope)
            .await?
            .ok_or_else(|| StoreError::ScopeNotFound(scope.to_string()))
    }

    /// Current tip of a scope, `None` if it has no records
    pub async fn tip(&self, scope: &str) -> StoreResult<Option<RecordHash>> {
        self.blobs.read_tip(scope).await
    }

    /// Persist a sealed record and move the scope tip to it
    ///
    /// The caller has already checked linkage against the tip; this only
    /// refuses to overwrite an existing attachment. If the tip cannot be
    /// moved the blob is withdrawn so the slot stays free for a retry.
    pub async fn append(&self, record: &Record) -> StoreResult<RecordHash> {
        let hash = sealed_hash(record)?;
        let key = AttachmentKey::for_record(record)?;
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.blobs.put_new(&record.scope, &key, &bytes).await?;
        if let Err(e) = self.blobs.write_tip(&record.scope, &hash).await {
            warn!(scope = %record.scope, key = %key, error = %e, "Tip write failed, withdrawing blob");
            if let Err(discard) = self.blobs.discard(&record.scope, &key).await {
                // a rebuild adopts the orphan and repairs the tip
                error!(scope = %record.scope, key = %key, error = %discard, "Blob left past the tip");
            }
            return Err(e);
        }

        debug!(
            scope = %record.scope,
            record_type = %record.record_type,
            hash = %hash,
            key = %key,
            "Record appended"
        );
        Ok(hash)
    }

    /// Read the record stored at `key`
    pub async fn get(&self, scope: &str, key: &AttachmentKey) -> StoreResult<Option<Record>> {
        match self.blobs.get(scope, key).await? {
            Some(bytes) => Ok(Some(decode_blob(scope, key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Lazy genesis-to-tip traversal
    pub fn walk(&self, scope: &str) -> ChainWalk {
        ChainWalk::new(self.blobs.clone(), scope)
    }

    /// Every record of a scope, genesis first
    pub async fn load_chain(&self, scope: &str) -> StoreResult<Vec<Record>> {
        let mut walk = self.walk(scope);
        let mut records = Vec::new();
        while let Some(record) = walk.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Genesis and tip hashes of a scope
    pub async fn scope_chain(&self, scope: &str) -> StoreResult<ScopeChain> {
        let tip_hash = self.get_tip(scope).await?;
        let genesis = self
            .get(scope, &AttachmentKey::Genesis)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("scope '{}' has a tip but no genesis", scope)))?;
        Ok(ScopeChain {
            scope_name: scope.to_string(),
            tip_hash,
            genesis_hash: sealed_hash(&genesis)?,
        })
    }

    /// Point the scope tip at `tip` regardless of its current value
    pub async fn repair_tip(&self, scope: &str, tip: &RecordHash) -> StoreResult<()> {
        self.blobs.write_tip(scope, tip).await?;
        info!(scope = %scope, hash = %tip, "Tip pointer repaired");
        Ok(())
    }

    /// Scopes present in storage
    pub async fn list_scopes(&self) -> StoreResult<Vec<String>> {
        self.blobs.list_scopes().await
    }
}

/// Restartable walk over a scope chain
///
/// Each step reads the blob attached after the previous record's
/// `current_hash`; the walk ends at the first missing blob. Structural
/// checks (linkage, hashes, signatures) are left to the caller.
pub struct ChainWalk {
    blobs: Arc<dyn BlobStore>,
    scope: String,
    next_key: Option<AttachmentKey>,
    index: usize,
    seen: HashSet<RecordHash>,
}

impl ChainWalk {
    fn new(blobs: Arc<dyn BlobStore>, scope: &str) -> Self {
        Self {
            blobs,
            scope: scope.to_string(),
            next_key: Some(AttachmentKey::Genesis),
            index: 0,
            seen: HashSet::new(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Position of the next record to be returned
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start again from genesis
    pub fn restart(&mut self) {
        self.next_key = Some(AttachmentKey::Genesis);
        self.index = 0;
        self.seen.clear();
    }

    /// Next record, or `None` at the end of the chain
    ///
    /// A blob whose `previous_hash` does not name the key it is stored
    /// under, or whose hash was already visited, is reported as corrupt.
    pub async fn next(&mut self) -> StoreResult<Option<Record>> {
        let Some(key) = self.next_key.take() else {
            return Ok(None);
        };
        let Some(bytes) = self.blobs.get(&self.scope, &key).await? else {
            return Ok(None);
        };

        let record = decode_blob(&self.scope, &key, &bytes)?;
        let expected = match &key {
            AttachmentKey::Genesis => String::new(),
            AttachmentKey::After(parent) => parent.to_base64(),
        };
        if record.previous_hash_str() != expected {
            return Err(StoreError::Corrupt(format!(
                "blob {} in scope '{}' links to '{}'",
                key,
                self.scope,
                record.previous_hash_str()
            )));
        }
        let hash = sealed_hash(&record)?;
        if !self.seen.insert(hash) {
            return Err(StoreError::Corrupt(format!(
                "blob {} in scope '{}' revisits {}",
                key, self.scope, hash
            )));
        }
        self.next_key = Some(AttachmentKey::After(hash));
        self.index += 1;
        Ok(Some(record))
    }
}

fn decode_blob(scope: &str, key: &AttachmentKey, bytes: &[u8]) -> StoreResult<Record> {
    let record: Record = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Corrupt(format!("blob {} in scope '{}': {}", key, scope, e)))?;
    if record.scope != scope {
        return Err(StoreError::Corrupt(format!(
            "blob {} in scope '{}' belongs to scope '{}'",
            key, scope, record.scope
        )));
    }
    Ok(record)
}

fn sealed_hash(record: &Record) -> StoreResult<RecordHash> {
    let current = record.current_hash.as_deref().ok_or_else(|| {
        StoreError::Serialization(format!(
            "record in scope '{}' is not sealed",
            record.scope
        ))
    })?;
    Ok(RecordHash::from_base64(current)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{FileBlobStore, MemoryBlobStore};
    use hl_core::{ProtocolVersion, RecordCodec};
    use serde_json::json;
    use tempfile::TempDir;

    fn sealed(scope: &str, record_type: &str, previous: &str, nonce: &str) -> Record {
        let mut record = Record::new(ProtocolVersion::V1, scope, nonce, record_type, json!({}))
            .with_previous_hash(previous);
        record.at = Some("1".to_string());
        record.current_hash = Some(RecordCodec::hash(&record).unwrap().to_base64());
        record
    }

    fn chain_of(scope: &str, len: usize) -> Vec<Record> {
        let mut records = vec![sealed(scope, "genesis", "", "n0")];
        for i in 1..len {
            let previous = records[i - 1].current_hash.clone().unwrap();
            records.push(sealed(scope, "note:add", &previous, &format!("n{}", i)));
        }
        records
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let store = ChainStore::new(Arc::new(MemoryBlobStore::new()));
        assert!(matches!(
            store.get_tip("self").await,
            Err(StoreError::ScopeNotFound(_))
        ));

        let records = chain_of("self", 4);
        for record in &records {
            store.append(record).await.unwrap();
        }

        let tip = store.get_tip("self").await.unwrap();
        assert_eq!(tip.to_base64(), records[3].current_hash.clone().unwrap());
        assert_eq!(store.load_chain("self").await.unwrap(), records);

        let summary = store.scope_chain("self").await.unwrap();
        assert_eq!(summary.tip_hash, tip);
        assert_eq!(
            summary.genesis_hash.to_base64(),
            records[0].current_hash.clone().unwrap()
        );
    }

    #[tokio::test]
    async fn test_fork_refused() {
        let store = ChainStore::new(Arc::new(MemoryBlobStore::new()));
        let records = chain_of("self", 2);
        store.append(&records[0]).await.unwrap();
        store.append(&records[1]).await.unwrap();

        let previous = records[0].current_hash.clone().unwrap();
        let fork = sealed("self", "note:add", &previous, "other");
        assert!(matches!(
            store.append(&fork).await,
            Err(StoreError::AttachmentExists { .. })
        ));
        // tip untouched
        assert_eq!(
            store.get_tip("self").await.unwrap().to_base64(),
            records[1].current_hash.clone().unwrap()
        );
    }

    #[tokio::test]
    async fn test_walk_restart() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = FileBlobStore::new(temp_dir.path()).await.unwrap();
        let store = ChainStore::new(Arc::new(blobs));
        for record in chain_of("", 3) {
            store.append(&record).await.unwrap();
        }

        let mut walk = store.walk("");
        assert!(walk.next().await.unwrap().unwrap().is_genesis());
        assert!(walk.next().await.unwrap().is_some());
        assert_eq!(walk.index(), 2);

        walk.restart();
        assert_eq!(walk.index(), 0);
        let mut count = 0;
        while walk.next().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(walk.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsealed_record_refused() {
        let store = ChainStore::new(Arc::new(MemoryBlobStore::new()));
        let record = Record::new(ProtocolVersion::V1, "self", "n", "genesis", json!({}));
        assert!(matches!(
            store.append(&record).await,
            Err(StoreError::Serialization(_))
        ));
        assert!(store.list_scopes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_walk_refuses_cycles() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = ChainStore::new(blobs.clone());
        let genesis = sealed("self", "genesis", "", "n0");
        store.append(&genesis).await.unwrap();
        let genesis_hash = RecordHash::from_base64(genesis.current_hash.as_deref().unwrap()).unwrap();

        // a copy of genesis stored after itself
        blobs
            .put_new(
                "self",
                &AttachmentKey::After(genesis_hash),
                &serde_json::to_vec(&genesis).unwrap(),
            )
            .await
            .unwrap();
        assert!(matches!(
            store.load_chain("self").await,
            Err(StoreError::Corrupt(_))
        ));

        // a blob that links correctly but claims its parent's hash
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = ChainStore::new(blobs.clone());
        store.append(&genesis).await.unwrap();
        let mut looping = sealed("self", "note:add", genesis.current_hash.as_deref().unwrap(), "n1");
        looping.current_hash = genesis.current_hash.clone();
        blobs
            .put_new(
                "self",
                &AttachmentKey::After(genesis_hash),
                &serde_json::to_vec(&looping).unwrap(),
            )
            .await
            .unwrap();
        let mut walk = store.walk("self");
        assert!(walk.next().await.unwrap().is_some());
        assert!(matches!(walk.next().await, Err(StoreError::Corrupt(_))));
    }
}
