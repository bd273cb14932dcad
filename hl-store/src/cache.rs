//! Record cache
//!
//! Secondary, queryable copy of committed records. Never authoritative: it
//! is refilled from the chains on bootstrap and may be flushed at any time.

use async_trait::async_trait;
use hl_core::Record;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::error::StoreResult;

/// Queryable record mirror
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Mirror a committed record; inserting the same record twice is a no-op
    async fn insert(&self, record: &Record) -> StoreResult<()>;

    /// Records of a scope whose type starts with `type_prefix`, in commit order
    async fn query(&self, scope: &str, type_prefix: &str) -> StoreResult<Vec<Record>>;

    /// Drop everything
    async fn flush(&self) -> StoreResult<()>;
}

#[derive(Default)]
struct CacheInner {
    by_scope: BTreeMap<String, Vec<Record>>,
    seen: HashSet<String>,
}

/// In-memory record cache
#[derive(Default)]
pub struct MemoryRecordCache {
    inner: RwLock<CacheInner>,
}

impl MemoryRecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached records
    pub async fn len(&self) -> usize {
        self.inner.read().await.seen.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordCache for MemoryRecordCache {
    async fn insert(&self, record: &Record) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let identity = record
            .current_hash
            .clone()
            .unwrap_or_else(|| format!("{}:{}", record.scope, record.nonce));
        if !inner.seen.insert(identity) {
            return Ok(());
        }
        inner
            .by_scope
            .entry(record.scope.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn query(&self, scope: &str, type_prefix: &str) -> StoreResult<Vec<Record>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_scope
            .get(scope)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.record_type.starts_with(type_prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn flush(&self) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.by_scope.clear();
        inner.seen.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_core::ProtocolVersion;
    use serde_json::json;

    fn record(scope: &str, record_type: &str, hash: &str) -> Record {
        let mut record = Record::new(ProtocolVersion::V1, scope, hash, record_type, json!({}));
        record.current_hash = Some(hash.to_string());
        record
    }

    #[tokio::test]
    async fn test_query_by_prefix_in_order() {
        let cache = MemoryRecordCache::new();
        cache.insert(&record("self", "genesis", "h0")).await.unwrap();
        cache.insert(&record("self", "key:grant", "h1")).await.unwrap();
        cache.insert(&record("self", "key:revoke", "h2")).await.unwrap();
        cache.insert(&record("other", "key:grant", "h3")).await.unwrap();

        let keys = cache.query("self", "key:").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].record_type, "key:grant");
        assert_eq!(keys[1].record_type, "key:revoke");

        assert_eq!(cache.query("self", "").await.unwrap().len(), 3);
        assert!(cache.query("missing", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_idempotent_and_flush() {
        let cache = MemoryRecordCache::new();
        let r = record("self", "genesis", "h0");
        cache.insert(&r).await.unwrap();
        cache.insert(&r).await.unwrap();
        assert_eq!(cache.len().await, 1);

        cache.flush().await.unwrap();
        assert!(cache.is_empty().await);
    }
}
