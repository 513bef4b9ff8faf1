// In-memory store for tests.
//
// InMemoryStore implements every store trait over Mutex-guarded collections.
// Seed it with the builder methods (`with_fact`, `with_digest_row`, ...),
// inject failures with `fail_*`, then inspect what the code under test wrote.
//
// Plus free helpers for constructing rows: `news_fact`, `digest_row`,
// `queue_row`, `trend_point`, `overview`, `neutrality_row`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use clarity_common::{BiasComponents, BiasScores};

use crate::models::*;
use crate::traits::{ContactStore, KeyStore, MemoryStore, NewsStore, SubscriptionStore};

#[derive(Default)]
struct Inner {
    facts: Vec<TruthFact>,
    inserted_facts: Vec<NewTruthFact>,
    ledger: Vec<NewLedgerEntry>,
    digest: Vec<DigestRow>,
    summaries: HashMap<Uuid, (String, Vec<String>)>,
    queue: Vec<QueueRow>,
    deleted_queue: Vec<Uuid>,
    trends: HashMap<String, Vec<OutletTrendPoint>>,
    overviews: HashMap<String, OutletOverview>,
    neutrality: Vec<OutletNeutralityRow>,
    contacts: Vec<Contact>,
    memories: Vec<Memory>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    keys: HashMap<String, Vec<u8>>,
    raced_keys: HashMap<String, Vec<u8>>,
    key_reads: usize,

    fail_ledger_story_ids: HashSet<String>,
    fail_fact_urls: HashSet<String>,
    fail_queue_delete: bool,
    fail_enqueue_urls: HashSet<String>,
    fail_reads: bool,
}

/// Stateful in-memory implementation of every store trait.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    // --- seeding ---

    pub fn with_fact(self, fact: TruthFact) -> Self {
        self.lock().facts.push(fact);
        self
    }

    pub fn with_digest_row(self, row: DigestRow) -> Self {
        self.lock().digest.push(row);
        self
    }

    pub fn with_queue_row(self, row: QueueRow) -> Self {
        self.lock().queue.push(row);
        self
    }

    pub fn with_trend(self, outlet: &str, point: OutletTrendPoint) -> Self {
        self.lock()
            .trends
            .entry(outlet.to_string())
            .or_default()
            .push(point);
        self
    }

    pub fn with_overview(self, overview: OutletOverview) -> Self {
        self.lock()
            .overviews
            .insert(overview.canonical_outlet.clone(), overview);
        self
    }

    pub fn with_neutrality_row(self, row: OutletNeutralityRow) -> Self {
        self.lock().neutrality.push(row);
        self
    }

    /// Mark a fact as already scored.
    pub fn with_ledger_for(self, truth_fact_id: Uuid) -> Self {
        self.lock().ledger.push(NewLedgerEntry {
            workspace_id: "global_news".into(),
            user_key: SYSTEM_USER_KEY.into(),
            user_id: None,
            truth_fact_id: Some(truth_fact_id),
            story_id: truth_fact_id.to_string(),
            story_title: "(seeded)".into(),
            story_url: None,
            outlet: None,
            category: "news".into(),
            raw_story: None,
            neutral_summary: None,
            notes: None,
            scores: BiasScores::derived(BiasComponents {
                language: 1.0,
                source: 1.0,
                framing: 1.0,
                context: 1.0,
            }),
        });
        self
    }

    // --- failure injection ---

    /// `insert_ledger` errors for entries with this `story_id`.
    pub fn fail_ledger_for(self, story_id: &str) -> Self {
        self.lock().fail_ledger_story_ids.insert(story_id.to_string());
        self
    }

    /// `insert_fact` errors for facts with this `raw_url`.
    pub fn fail_fact_for(self, url: &str) -> Self {
        self.lock().fail_fact_urls.insert(url.to_string());
        self
    }

    /// `enqueue_story` errors for this URL.
    pub fn fail_enqueue_for(self, url: &str) -> Self {
        self.lock().fail_enqueue_urls.insert(url.to_string());
        self
    }

    pub fn fail_queue_delete(self) -> Self {
        self.lock().fail_queue_delete = true;
        self
    }

    /// Every batch read errors.
    pub fn fail_reads(self) -> Self {
        self.lock().fail_reads = true;
        self
    }

    /// The next `insert_key` for this workspace loses a race to `key`.
    pub fn race_key_insert(&self, workspace_id: &str, key: [u8; 32]) {
        self.lock()
            .raced_keys
            .insert(workspace_id.to_string(), key.to_vec());
    }

    // --- inspection ---

    pub fn ledger_entries(&self) -> Vec<NewLedgerEntry> {
        self.lock().ledger.clone()
    }

    pub fn inserted_facts(&self) -> Vec<NewTruthFact> {
        self.lock().inserted_facts.clone()
    }

    pub fn summary_for(&self, id: Uuid) -> Option<(String, Vec<String>)> {
        self.lock().summaries.get(&id).cloned()
    }

    pub fn summary_updates(&self) -> usize {
        self.lock().summaries.len()
    }

    /// Rows currently on the backfill queue, in insertion order.
    pub fn queued_rows(&self) -> Vec<QueueRow> {
        self.lock().queue.clone()
    }

    pub fn deleted_queue_ids(&self) -> Vec<Uuid> {
        self.lock().deleted_queue.clone()
    }

    pub fn subscription(&self, id: &str) -> Option<SubscriptionRecord> {
        self.lock().subscriptions.get(id).cloned()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.lock().contacts.clone()
    }

    pub fn memories(&self) -> Vec<Memory> {
        self.lock().memories.clone()
    }

    pub fn key_reads(&self) -> usize {
        self.lock().key_reads
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// A news-domain fact created `age_minutes` ago.
pub fn news_fact(url: &str, snapshot: Option<&str>, age_minutes: i64) -> TruthFact {
    TruthFact {
        id: Uuid::new_v4(),
        workspace_id: Some("global_news".into()),
        user_key: Some(SYSTEM_USER_KEY.into()),
        user_id: None,
        query: Some(url.into()),
        summary: None,
        scientific_domain: Some(NEWS_DOMAIN.into()),
        category: Some(NEWS_STORY_CATEGORY.into()),
        status: Some("ingested".into()),
        raw_url: Some(url.into()),
        raw_snapshot: snapshot.map(str::to_string),
        created_at: Utc::now() - Duration::minutes(age_minutes),
    }
}

/// A digest row for `truth_fact_id` created `age_minutes` ago.
pub fn digest_row(
    truth_fact_id: Option<Uuid>,
    url: Option<&str>,
    summary: Option<&str>,
    age_minutes: i64,
) -> DigestRow {
    let created_at = Utc::now() - Duration::minutes(age_minutes);
    DigestRow {
        ledger_id: Uuid::new_v4(),
        truth_fact_id,
        story_title: Some("Story".into()),
        story_url: url.map(str::to_string),
        outlet: url.and_then(clarity_common::outlet_from_url),
        neutral_summary: summary.map(str::to_string),
        key_facts: None,
        bias_language_score: Some(1.0),
        bias_source_score: Some(1.0),
        bias_framing_score: Some(1.0),
        bias_context_score: Some(1.0),
        bias_intent_score: Some(1.0),
        pi_score: Some(0.667),
        created_at,
        day: Some(created_at.date_naive()),
    }
}

pub fn queue_row(url: Option<&str>, outlet: Option<&str>, age_minutes: i64) -> QueueRow {
    QueueRow {
        id: Uuid::new_v4(),
        outlet: outlet.map(str::to_string),
        story_url: url.map(str::to_string),
        source: None,
        created_at: Utc::now() - Duration::minutes(age_minutes),
    }
}

pub fn trend_point(day: NaiveDate, count: i64, pi: f64) -> OutletTrendPoint {
    OutletTrendPoint {
        story_day: day,
        outlet_story_count: count,
        avg_bias_intent: Some(3.0 * (1.0 - pi)),
        avg_pi_score: Some(pi),
        avg_bias_language: None,
        avg_bias_source: None,
        avg_bias_framing: None,
        avg_bias_context: None,
    }
}

/// An overview row for a canonical outlet.
pub fn overview(canonical: &str, total_stories: i64, pi: f64) -> OutletOverview {
    OutletOverview {
        canonical_outlet: canonical.into(),
        total_stories,
        days_active: 1,
        last_story_day: Some(Utc::now().date_naive()),
        avg_pi_weighted: Some(pi),
        avg_bias_intent_weighted: Some(3.0 * (1.0 - pi)),
        avg_bias_language_weighted: None,
        avg_bias_source_weighted: None,
        avg_bias_framing_weighted: None,
        avg_bias_context_weighted: None,
    }
}

pub fn neutrality_row(outlet: &str, story_count: i64, pi: f64) -> OutletNeutralityRow {
    OutletNeutralityRow {
        outlet: outlet.into(),
        story_count,
        avg_bias_intent_score: Some(3.0 * (1.0 - pi)),
        bias_intent_score_stddev: None,
        avg_pi_score: Some(pi),
        first_scored_at: Some(Utc::now() - Duration::days(30)),
        last_scored_at: Some(Utc::now()),
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl NewsStore for InMemoryStore {
    async fn recent_news_facts(&self, limit: i64) -> Result<Vec<TruthFact>> {
        let inner = self.lock();
        if inner.fail_reads {
            bail!("InMemoryStore: reads disabled");
        }
        let mut facts: Vec<_> = inner
            .facts
            .iter()
            .filter(|f| f.scientific_domain.as_deref() == Some(NEWS_DOMAIN))
            .cloned()
            .collect();
        facts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        facts.truncate(limit.max(0) as usize);
        Ok(facts)
    }

    async fn ledger_exists(&self, truth_fact_id: Uuid) -> Result<bool> {
        Ok(self
            .lock()
            .ledger
            .iter()
            .any(|e| e.truth_fact_id == Some(truth_fact_id)))
    }

    async fn insert_ledger(&self, entry: &NewLedgerEntry) -> Result<Uuid> {
        let mut inner = self.lock();
        if inner.fail_ledger_story_ids.contains(&entry.story_id) {
            bail!("InMemoryStore: ledger insert rejected for {}", entry.story_id);
        }
        inner.ledger.push(entry.clone());
        Ok(Uuid::new_v4())
    }

    async fn recent_digest_rows(&self, limit: i64) -> Result<Vec<DigestRow>> {
        let inner = self.lock();
        if inner.fail_reads {
            bail!("InMemoryStore: reads disabled");
        }
        let mut rows = inner.digest.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn update_fact_summary(
        &self,
        id: Uuid,
        summary: &str,
        key_facts: &[String],
    ) -> Result<()> {
        let mut inner = self.lock();
        let known = inner.facts.iter().any(|f| f.id == id)
            || inner.digest.iter().any(|r| r.truth_fact_id == Some(id));
        if !known {
            bail!("truth_fact {id} not found");
        }

        // The digest view prefers the fact's summary over the ledger's.
        for row in inner.digest.iter_mut().filter(|r| r.truth_fact_id == Some(id)) {
            row.neutral_summary = Some(summary.to_string());
            row.key_facts = Some(serde_json::json!(key_facts));
        }
        inner
            .summaries
            .insert(id, (summary.to_string(), key_facts.to_vec()));
        Ok(())
    }

    async fn queue_batch(&self, limit: i64) -> Result<Vec<QueueRow>> {
        let inner = self.lock();
        if inner.fail_reads {
            bail!("InMemoryStore: reads disabled");
        }
        let mut rows = inner.queue.clone();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn fact_exists_for_url(&self, url: &str) -> Result<bool> {
        Ok(self.lock().facts.iter().any(|f| {
            f.scientific_domain.as_deref() == Some(NEWS_DOMAIN)
                && f.category.as_deref() == Some(NEWS_STORY_CATEGORY)
                && f.raw_url.as_deref() == Some(url)
        }))
    }

    async fn insert_fact(&self, fact: &NewTruthFact) -> Result<Uuid> {
        let mut inner = self.lock();
        if inner.fail_fact_urls.contains(&fact.raw_url) {
            bail!("InMemoryStore: fact insert rejected for {}", fact.raw_url);
        }
        let id = Uuid::new_v4();
        inner.facts.push(TruthFact {
            id,
            workspace_id: Some(fact.workspace_id.clone()),
            user_key: Some(fact.user_key.clone()),
            user_id: None,
            query: fact.query.clone(),
            summary: fact.summary.clone(),
            scientific_domain: Some(fact.scientific_domain.clone()),
            category: Some(fact.category.clone()),
            status: Some(fact.status.clone()),
            raw_url: Some(fact.raw_url.clone()),
            raw_snapshot: fact.raw_snapshot.clone(),
            created_at: Utc::now(),
        });
        inner.inserted_facts.push(fact.clone());
        Ok(id)
    }

    async fn delete_queue_row(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_queue_delete {
            bail!("InMemoryStore: queue delete disabled");
        }
        inner.queue.retain(|r| r.id != id);
        inner.deleted_queue.push(id);
        Ok(())
    }

    async fn enqueue_story(&self, item: &NewQueueItem) -> Result<bool> {
        let mut inner = self.lock();
        if inner.fail_enqueue_urls.contains(&item.story_url) {
            bail!("InMemoryStore: enqueue rejected for {}", item.story_url);
        }
        if inner
            .queue
            .iter()
            .any(|r| r.story_url.as_deref() == Some(item.story_url.as_str()))
        {
            return Ok(false);
        }
        inner.queue.push(QueueRow {
            id: Uuid::new_v4(),
            outlet: Some(item.outlet.clone()),
            story_url: Some(item.story_url.clone()),
            source: Some(item.source.clone()),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn outlet_trends(&self, outlet: &str) -> Result<Vec<OutletTrendPoint>> {
        let mut points = self.lock().trends.get(outlet).cloned().unwrap_or_default();
        points.sort_by_key(|p| p.story_day);
        Ok(points)
    }

    async fn outlet_overview(&self, outlet: &str) -> Result<Option<OutletOverview>> {
        Ok(self.lock().overviews.get(outlet).cloned())
    }

    async fn outlet_overviews(&self, limit: i64) -> Result<Vec<OutletOverview>> {
        let inner = self.lock();
        if inner.fail_reads {
            bail!("InMemoryStore: reads disabled");
        }
        let mut rows: Vec<_> = inner.overviews.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.total_stories
                .cmp(&a.total_stories)
                .then_with(|| a.canonical_outlet.cmp(&b.canonical_outlet))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn outlet_neutrality(
        &self,
        min_story_count: i64,
        sort: OutletSort,
        limit: i64,
    ) -> Result<Vec<OutletNeutralityRow>> {
        let inner = self.lock();
        if inner.fail_reads {
            bail!("InMemoryStore: reads disabled");
        }
        let mut rows: Vec<_> = inner
            .neutrality
            .iter()
            .filter(|r| r.story_count >= min_story_count)
            .cloned()
            .collect();
        match sort {
            OutletSort::Stories => rows.sort_by(|a, b| {
                b.story_count
                    .cmp(&a.story_count)
                    .then_with(|| a.outlet.cmp(&b.outlet))
            }),
            OutletSort::Neutrality => rows.sort_by(|a, b| {
                b.avg_pi_score
                    .unwrap_or(f64::MIN)
                    .total_cmp(&a.avg_pi_score.unwrap_or(f64::MIN))
                    .then_with(|| a.outlet.cmp(&b.outlet))
            }),
        }
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn list_contacts(
        &self,
        user_id: &str,
        workspace_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Contact>> {
        let mut rows: Vec<_> = self
            .lock()
            .contacts
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter(|c| match workspace_id {
                Some(ws) => c.workspace_id.is_none() || c.workspace_id.as_deref() == Some(ws),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn create_contact(&self, user_id: &str, c: &NewContact) -> Result<Contact> {
        let now = Utc::now();
        let contact = Contact {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            workspace_id: c.workspace_id.clone(),
            name: c.name.clone(),
            relationship_type: c.relationship_type.clone(),
            primary_email: c.primary_email.clone(),
            primary_phone: c.primary_phone.clone(),
            notes: c.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.lock().contacts.push(contact.clone());
        Ok(contact)
    }

    async fn update_contact(
        &self,
        id: Uuid,
        user_id: &str,
        p: &ContactPatch,
    ) -> Result<Option<Contact>> {
        let mut inner = self.lock();
        let Some(c) = inner
            .contacts
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(v) = &p.workspace_id {
            c.workspace_id = v.clone();
        }
        if let Some(v) = &p.name {
            c.name = v.clone();
        }
        if let Some(v) = &p.relationship_type {
            c.relationship_type = v.clone();
        }
        if let Some(v) = &p.primary_email {
            c.primary_email = v.clone();
        }
        if let Some(v) = &p.primary_phone {
            c.primary_phone = v.clone();
        }
        if let Some(v) = &p.notes {
            c.notes = v.clone();
        }
        c.updated_at = Utc::now();
        Ok(Some(c.clone()))
    }

    async fn delete_contact(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let mut inner = self.lock();
        let before = inner.contacts.len();
        inner
            .contacts
            .retain(|c| !(c.id == id && c.user_id == user_id));
        Ok(inner.contacts.len() < before)
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn list_memories(
        &self,
        user_id: &str,
        workspace_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Memory>> {
        let mut rows: Vec<_> = self
            .lock()
            .memories
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter(|m| workspace_id.map_or(true, |ws| m.workspace_id == ws))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn create_memory(&self, user_id: &str, m: &NewMemory) -> Result<Memory> {
        let now = Utc::now();
        let memory = Memory {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            workspace_id: m.workspace_id.clone(),
            memory_type: m.memory_type.as_str().to_string(),
            content: m.content.clone(),
            source: "explicit".into(),
            source_confidence: 1.0,
            created_at: now,
            updated_at: now,
        };
        self.lock().memories.push(memory.clone());
        Ok(memory)
    }

    async fn update_memory_content(
        &self,
        id: Uuid,
        user_id: &str,
        content: &str,
    ) -> Result<Option<Memory>> {
        let mut inner = self.lock();
        let Some(m) = inner
            .memories
            .iter_mut()
            .find(|m| m.id == id && m.user_id == user_id)
        else {
            return Ok(None);
        };
        m.content = content.to_string();
        m.updated_at = Utc::now();
        Ok(Some(m.clone()))
    }

    async fn delete_memory(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let mut inner = self.lock();
        let before = inner.memories.len();
        inner
            .memories
            .retain(|m| !(m.id == id && m.user_id == user_id));
        Ok(inner.memories.len() < before)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn upsert_subscription(&self, r: &SubscriptionRecord) -> Result<()> {
        let mut inner = self.lock();
        let merged = match inner.subscriptions.get(&r.stripe_subscription_id) {
            Some(prev) => SubscriptionRecord {
                stripe_subscription_id: r.stripe_subscription_id.clone(),
                stripe_customer_id: r
                    .stripe_customer_id
                    .clone()
                    .or_else(|| prev.stripe_customer_id.clone()),
                user_id: r.user_id.clone().or_else(|| prev.user_id.clone()),
                workspace_id: r.workspace_id.clone().or_else(|| prev.workspace_id.clone()),
                status: r.status.clone(),
                price_id: r.price_id.clone().or_else(|| prev.price_id.clone()),
                cancel_at_period_end: r.cancel_at_period_end.or(prev.cancel_at_period_end),
                current_period_start: r.current_period_start.or(prev.current_period_start),
                current_period_end: r.current_period_end.or(prev.current_period_end),
                last_event_type: r.last_event_type.clone(),
            },
            None => r.clone(),
        };
        inner
            .subscriptions
            .insert(r.stripe_subscription_id.clone(), merged);
        Ok(())
    }
}

#[async_trait]
impl KeyStore for InMemoryStore {
    async fn find_key(&self, workspace_id: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.lock();
        inner.key_reads += 1;
        Ok(inner.keys.get(workspace_id).cloned())
    }

    async fn insert_key(&self, workspace_id: &str, key: &[u8]) -> Result<bool> {
        let mut inner = self.lock();
        if let Some(winner) = inner.raced_keys.remove(workspace_id) {
            inner.keys.insert(workspace_id.to_string(), winner);
        }
        if inner.keys.contains_key(workspace_id) {
            return Ok(false);
        }
        inner.keys.insert(workspace_id.to_string(), key.to_vec());
        Ok(true)
    }
}
