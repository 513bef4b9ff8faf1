// Store seams. Workers and handlers depend on these traits so tests can run
// against InMemoryStore with no database.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Contact, ContactPatch, DigestRow, Memory, NewContact, NewLedgerEntry, NewMemory,
    NewQueueItem, NewTruthFact, OutletNeutralityRow, OutletOverview, OutletSort, OutletTrendPoint,
    QueueRow, SubscriptionRecord, TruthFact,
};

// ---------------------------------------------------------------------------
// NewsStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Most recent `truth_facts` in the news domain, newest first.
    async fn recent_news_facts(&self, limit: i64) -> Result<Vec<TruthFact>>;

    /// Whether a ledger row already references this fact.
    async fn ledger_exists(&self, truth_fact_id: Uuid) -> Result<bool>;

    async fn insert_ledger(&self, entry: &NewLedgerEntry) -> Result<Uuid>;

    /// Digest view rows, newest first.
    async fn recent_digest_rows(&self, limit: i64) -> Result<Vec<DigestRow>>;

    async fn update_fact_summary(&self, id: Uuid, summary: &str, key_facts: &[String])
        -> Result<()>;

    /// Backfill queue rows, oldest first.
    async fn queue_batch(&self, limit: i64) -> Result<Vec<QueueRow>>;

    /// Whether an ingested news story already exists for this URL.
    async fn fact_exists_for_url(&self, url: &str) -> Result<bool>;

    async fn insert_fact(&self, fact: &NewTruthFact) -> Result<Uuid>;

    async fn delete_queue_row(&self, id: Uuid) -> Result<()>;

    /// Queue a story URL. `false` when the URL is already queued.
    async fn enqueue_story(&self, item: &NewQueueItem) -> Result<bool>;

    /// Daily trend points for a canonical outlet, oldest day first.
    async fn outlet_trends(&self, outlet: &str) -> Result<Vec<OutletTrendPoint>>;

    async fn outlet_overview(&self, outlet: &str) -> Result<Option<OutletOverview>>;

    /// Every outlet overview, most stories first.
    async fn outlet_overviews(&self, limit: i64) -> Result<Vec<OutletOverview>>;

    /// Outlets with at least `min_story_count` scored stories.
    async fn outlet_neutrality(
        &self,
        min_story_count: i64,
        sort: OutletSort,
        limit: i64,
    ) -> Result<Vec<OutletNeutralityRow>>;
}

// ---------------------------------------------------------------------------
// ContactStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Contacts owned by `user_id`. With a workspace, returns that
    /// workspace's contacts plus personal (workspace-less) ones.
    async fn list_contacts(
        &self,
        user_id: &str,
        workspace_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Contact>>;

    async fn create_contact(&self, user_id: &str, contact: &NewContact) -> Result<Contact>;

    /// `None` when no contact with this id belongs to `user_id`.
    async fn update_contact(
        &self,
        id: Uuid,
        user_id: &str,
        patch: &ContactPatch,
    ) -> Result<Option<Contact>>;

    async fn delete_contact(&self, id: Uuid, user_id: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn list_memories(
        &self,
        user_id: &str,
        workspace_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Memory>>;

    async fn create_memory(&self, user_id: &str, memory: &NewMemory) -> Result<Memory>;

    async fn update_memory_content(
        &self,
        id: Uuid,
        user_id: &str,
        content: &str,
    ) -> Result<Option<Memory>>;

    async fn delete_memory(&self, id: Uuid, user_id: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// SubscriptionStore / KeyStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or update keyed by `stripe_subscription_id`. Fields that are
    /// `None` on the record keep their stored value.
    async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<()>;
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn find_key(&self, workspace_id: &str) -> Result<Option<Vec<u8>>>;

    /// Returns `false` if a key for this workspace already exists.
    async fn insert_key(&self, workspace_id: &str, key: &[u8]) -> Result<bool>;
}
