use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::traits::KeyStore;

pub const KEY_BYTES: usize = 32;

pub type WorkspaceKey = [u8; KEY_BYTES];

/// Read-through cache of per-workspace AES keys.
///
/// Hits are served under a read lock. Misses go to the store with no lock
/// held and only take the write lock to publish the result. Concurrent
/// initializers are settled by the store's unique constraint: the loser
/// re-reads the winner's key.
pub struct KeyCache {
    store: Arc<dyn KeyStore>,
    keys: RwLock<HashMap<String, WorkspaceKey>>,
}

impl KeyCache {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            keys: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_init(&self, workspace_id: &str) -> Result<WorkspaceKey> {
        if let Some(key) = self.keys.read().await.get(workspace_id) {
            return Ok(*key);
        }

        let key = match self.store.find_key(workspace_id).await? {
            Some(bytes) => to_key(workspace_id, &bytes)?,
            None => self.create(workspace_id).await?,
        };

        let mut keys = self.keys.write().await;
        Ok(*keys.entry(workspace_id.to_string()).or_insert(key))
    }

    /// Number of cached workspaces.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    async fn create(&self, workspace_id: &str) -> Result<WorkspaceKey> {
        let mut key = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut key);

        if self.store.insert_key(workspace_id, &key).await? {
            info!(workspace_id, "Created workspace key");
            return Ok(key);
        }

        debug!(workspace_id, "Workspace key created concurrently, re-reading");
        let bytes = self
            .store
            .find_key(workspace_id)
            .await?
            .ok_or_else(|| anyhow!("workspace key for {workspace_id} vanished after conflict"))?;
        to_key(workspace_id, &bytes)
    }
}

fn to_key(workspace_id: &str, bytes: &[u8]) -> Result<WorkspaceKey> {
    if bytes.len() != KEY_BYTES {
        bail!(
            "workspace key for {workspace_id} has {} bytes, expected {KEY_BYTES}",
            bytes.len()
        );
    }
    let mut key = [0u8; KEY_BYTES];
    key.copy_from_slice(bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;

    #[tokio::test]
    async fn creates_then_caches() {
        let store = Arc::new(InMemoryStore::new());
        let cache = KeyCache::new(store.clone());

        let first = cache.get_or_init("ws-1").await.unwrap();
        let second = cache.get_or_init("ws-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.key_reads(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn reads_existing_key_from_store() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_key("ws-2", &[7u8; 32]).await.unwrap();
        let cache = KeyCache::new(store);

        assert_eq!(cache.get_or_init("ws-2").await.unwrap(), [7u8; 32]);
    }

    #[tokio::test]
    async fn insert_conflict_rereads_winner() {
        let store = Arc::new(InMemoryStore::new());
        // Another process wins the insert between our read and write.
        store.race_key_insert("ws-3", [9u8; 32]);
        let cache = KeyCache::new(store);

        assert_eq!(cache.get_or_init("ws-3").await.unwrap(), [9u8; 32]);
    }

    #[tokio::test]
    async fn wrong_length_key_is_error() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_key("ws-4", &[1u8; 16]).await.unwrap();
        let cache = KeyCache::new(store);

        assert!(cache.get_or_init("ws-4").await.is_err());
    }

    /// Blocks `find_key` for one workspace until released.
    struct GatedStore {
        inner: InMemoryStore,
        gated: &'static str,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl KeyStore for GatedStore {
        async fn find_key(&self, workspace_id: &str) -> Result<Option<Vec<u8>>> {
            if workspace_id == self.gated {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.find_key(workspace_id).await
        }

        async fn insert_key(&self, workspace_id: &str, key: &[u8]) -> Result<bool> {
            self.inner.insert_key(workspace_id, key).await
        }
    }

    #[tokio::test]
    async fn slow_miss_does_not_block_other_workspaces() {
        let store = Arc::new(GatedStore {
            inner: InMemoryStore::new(),
            gated: "slow",
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let cache = Arc::new(KeyCache::new(store.clone()));

        let slow = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_or_init("slow").await.unwrap() }
        });
        store.entered.notified().await;

        let fast = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            cache.get_or_init("fast"),
        )
        .await
        .expect("cold lookup for another workspace waited on the slow one")
        .unwrap();
        assert_eq!(cache.get_or_init("fast").await.unwrap(), fast);

        store.release.notify_one();
        slow.await.unwrap();
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_misses_agree() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(KeyCache::new(store));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_init("shared").await.unwrap() })
            })
            .collect();

        let mut keys = Vec::new();
        for h in handles {
            keys.push(h.await.unwrap());
        }
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }
}
