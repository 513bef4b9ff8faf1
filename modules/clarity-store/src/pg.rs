use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;
use crate::traits::{ContactStore, KeyStore, MemoryStore, NewsStore, SubscriptionStore};

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazily connect; the first query opens the connection.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(database_url)
            .context("Invalid DATABASE_URL")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

const TRUTH_FACT_COLUMNS: &str = "id, workspace_id, user_key, user_id, query, summary, \
     scientific_domain, category, status, raw_url, raw_snapshot, created_at";

const DIGEST_COLUMNS: &str = "ledger_id, truth_fact_id, story_title, story_url, outlet, \
     neutral_summary, key_facts, bias_language_score, bias_source_score, bias_framing_score, \
     bias_context_score, bias_intent_score, pi_score, created_at, day";

// ---------------------------------------------------------------------------
// NewsStore
// ---------------------------------------------------------------------------

#[async_trait]
impl NewsStore for PgStore {
    async fn recent_news_facts(&self, limit: i64) -> Result<Vec<TruthFact>> {
        let sql = format!(
            "SELECT {TRUTH_FACT_COLUMNS} FROM truth_facts \
             WHERE scientific_domain = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, TruthFact>(&sql)
            .bind(NEWS_DOMAIN)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn ledger_exists(&self, truth_fact_id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM neutrality_ledger WHERE truth_fact_id = $1)",
        )
        .bind(truth_fact_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_ledger(&self, e: &NewLedgerEntry) -> Result<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO neutrality_ledger
                (workspace_id, user_key, user_id, truth_fact_id, story_id, story_title,
                 story_url, outlet, category, raw_story, neutral_summary, notes,
                 pi_score, bias_language_score, bias_source_score, bias_framing_score,
                 bias_context_score, bias_intent_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id
            "#,
        )
        .bind(&e.workspace_id)
        .bind(&e.user_key)
        .bind(&e.user_id)
        .bind(e.truth_fact_id)
        .bind(&e.story_id)
        .bind(&e.story_title)
        .bind(&e.story_url)
        .bind(&e.outlet)
        .bind(&e.category)
        .bind(&e.raw_story)
        .bind(&e.neutral_summary)
        .bind(&e.notes)
        .bind(e.scores.pi_score)
        .bind(e.scores.bias_language_score)
        .bind(e.scores.bias_source_score)
        .bind(e.scores.bias_framing_score)
        .bind(e.scores.bias_context_score)
        .bind(e.scores.bias_intent_score)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn recent_digest_rows(&self, limit: i64) -> Result<Vec<DigestRow>> {
        let sql = format!(
            "SELECT {DIGEST_COLUMNS} FROM solace_news_digest_view \
             ORDER BY created_at DESC \
             LIMIT $1"
        );
        sqlx::query_as::<_, DigestRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn update_fact_summary(
        &self,
        id: Uuid,
        summary: &str,
        key_facts: &[String],
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE truth_facts
            SET neutral_summary = $2, key_facts = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(summary)
        .bind(serde_json::json!(key_facts))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("truth_fact {id} not found");
        }
        Ok(())
    }

    async fn queue_batch(&self, limit: i64) -> Result<Vec<QueueRow>> {
        sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT id, outlet, story_url, source, created_at
            FROM news_backfill_queue
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn fact_exists_for_url(&self, url: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM truth_facts
                WHERE scientific_domain = $1 AND category = $2 AND raw_url = $3
            )
            "#,
        )
        .bind(NEWS_DOMAIN)
        .bind(NEWS_STORY_CATEGORY)
        .bind(url)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_fact(&self, f: &NewTruthFact) -> Result<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO truth_facts
                (workspace_id, user_key, query, summary, scientific_domain, category,
                 status, confidence_level, pi_score, sources, raw_url, raw_snapshot)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&f.workspace_id)
        .bind(&f.user_key)
        .bind(&f.query)
        .bind(&f.summary)
        .bind(&f.scientific_domain)
        .bind(&f.category)
        .bind(&f.status)
        .bind(&f.confidence_level)
        .bind(f.pi_score)
        .bind(&f.sources)
        .bind(&f.raw_url)
        .bind(&f.raw_snapshot)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn delete_queue_row(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM news_backfill_queue WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn enqueue_story(&self, item: &NewQueueItem) -> Result<bool> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO news_backfill_queue (outlet, story_url, source)
            VALUES ($1, $2, $3)
            ON CONFLICT (story_url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&item.outlet)
        .bind(&item.story_url)
        .bind(&item.source)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.is_some())
    }

    async fn outlet_trends(&self, outlet: &str) -> Result<Vec<OutletTrendPoint>> {
        sqlx::query_as::<_, OutletTrendPoint>(
            r#"
            SELECT story_day, outlet_story_count, avg_bias_intent, avg_pi_score,
                   avg_bias_language, avg_bias_source, avg_bias_framing, avg_bias_context
            FROM outlet_bias_pi_daily_trends
            WHERE outlet_canonical = $1
            ORDER BY story_day ASC
            "#,
        )
        .bind(outlet)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn outlet_overview(&self, outlet: &str) -> Result<Option<OutletOverview>> {
        sqlx::query_as::<_, OutletOverview>(
            r#"
            SELECT canonical_outlet, total_stories, days_active, last_story_day,
                   avg_pi_weighted, avg_bias_intent_weighted, avg_bias_language_weighted,
                   avg_bias_source_weighted, avg_bias_framing_weighted, avg_bias_context_weighted
            FROM outlet_bias_pi_overview
            WHERE canonical_outlet = $1
            "#,
        )
        .bind(outlet)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn outlet_overviews(&self, limit: i64) -> Result<Vec<OutletOverview>> {
        sqlx::query_as::<_, OutletOverview>(
            r#"
            SELECT canonical_outlet, total_stories, days_active, last_story_day,
                   avg_pi_weighted, avg_bias_intent_weighted, avg_bias_language_weighted,
                   avg_bias_source_weighted, avg_bias_framing_weighted, avg_bias_context_weighted
            FROM outlet_bias_pi_overview
            ORDER BY total_stories DESC, canonical_outlet ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn outlet_neutrality(
        &self,
        min_story_count: i64,
        sort: OutletSort,
        limit: i64,
    ) -> Result<Vec<OutletNeutralityRow>> {
        let order = match sort {
            OutletSort::Stories => "story_count DESC",
            OutletSort::Neutrality => "avg_pi_score DESC NULLS LAST",
        };
        let sql = format!(
            "SELECT outlet, story_count, avg_bias_intent_score, bias_intent_score_stddev, \
                    avg_pi_score, first_scored_at, last_scored_at \
             FROM outlet_neutrality_aggregates \
             WHERE story_count >= $1 \
             ORDER BY {order}, outlet ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, OutletNeutralityRow>(&sql)
            .bind(min_story_count)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// ContactStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ContactStore for PgStore {
    async fn list_contacts(
        &self,
        user_id: &str,
        workspace_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Contact>> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM rolodex
            WHERE user_id = $1
              AND ($2::text IS NULL OR workspace_id = $2 OR workspace_id IS NULL)
            ORDER BY updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(workspace_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn create_contact(&self, user_id: &str, c: &NewContact) -> Result<Contact> {
        sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO rolodex
                (user_id, workspace_id, name, relationship_type, primary_email, primary_phone, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&c.workspace_id)
        .bind(&c.name)
        .bind(&c.relationship_type)
        .bind(&c.primary_email)
        .bind(&c.primary_phone)
        .bind(&c.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn update_contact(
        &self,
        id: Uuid,
        user_id: &str,
        p: &ContactPatch,
    ) -> Result<Option<Contact>> {
        // Each nullable column takes a "present" flag plus its new value so an
        // explicit null can clear it.
        sqlx::query_as::<_, Contact>(
            r#"
            UPDATE rolodex SET
                workspace_id      = CASE WHEN $3  THEN $4  ELSE workspace_id END,
                name              = COALESCE($5, name),
                relationship_type = CASE WHEN $6  THEN $7  ELSE relationship_type END,
                primary_email     = CASE WHEN $8  THEN $9  ELSE primary_email END,
                primary_phone     = CASE WHEN $10 THEN $11 ELSE primary_phone END,
                notes             = CASE WHEN $12 THEN $13 ELSE notes END,
                updated_at        = now()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(p.workspace_id.is_some())
        .bind(p.workspace_id.clone().flatten())
        .bind(&p.name)
        .bind(p.relationship_type.is_some())
        .bind(p.relationship_type.clone().flatten())
        .bind(p.primary_email.is_some())
        .bind(p.primary_email.clone().flatten())
        .bind(p.primary_phone.is_some())
        .bind(p.primary_phone.clone().flatten())
        .bind(p.notes.is_some())
        .bind(p.notes.clone().flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn delete_contact(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rolodex WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[async_trait]
impl MemoryStore for PgStore {
    async fn list_memories(
        &self,
        user_id: &str,
        workspace_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Memory>> {
        sqlx::query_as::<_, Memory>(
            r#"
            SELECT * FROM memories
            WHERE user_id = $1 AND ($2::text IS NULL OR workspace_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(workspace_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn create_memory(&self, user_id: &str, m: &NewMemory) -> Result<Memory> {
        sqlx::query_as::<_, Memory>(
            r#"
            INSERT INTO memories (user_id, workspace_id, memory_type, content, source, source_confidence)
            VALUES ($1, $2, $3, $4, 'explicit', 1)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&m.workspace_id)
        .bind(m.memory_type.as_str())
        .bind(&m.content)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn update_memory_content(
        &self,
        id: Uuid,
        user_id: &str,
        content: &str,
    ) -> Result<Option<Memory>> {
        sqlx::query_as::<_, Memory>(
            r#"
            UPDATE memories SET content = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn delete_memory(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM memories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// SubscriptionStore / KeyStore
// ---------------------------------------------------------------------------

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn upsert_subscription(&self, r: &SubscriptionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (stripe_subscription_id, stripe_customer_id, user_id, workspace_id, status,
                 price_id, cancel_at_period_end, current_period_start, current_period_end,
                 last_event_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (stripe_subscription_id) DO UPDATE SET
                stripe_customer_id   = COALESCE(EXCLUDED.stripe_customer_id, subscriptions.stripe_customer_id),
                user_id              = COALESCE(EXCLUDED.user_id, subscriptions.user_id),
                workspace_id         = COALESCE(EXCLUDED.workspace_id, subscriptions.workspace_id),
                status               = EXCLUDED.status,
                price_id             = COALESCE(EXCLUDED.price_id, subscriptions.price_id),
                cancel_at_period_end = COALESCE(EXCLUDED.cancel_at_period_end, subscriptions.cancel_at_period_end),
                current_period_start = COALESCE(EXCLUDED.current_period_start, subscriptions.current_period_start),
                current_period_end   = COALESCE(EXCLUDED.current_period_end, subscriptions.current_period_end),
                last_event_type      = EXCLUDED.last_event_type,
                updated_at           = now()
            "#,
        )
        .bind(&r.stripe_subscription_id)
        .bind(&r.stripe_customer_id)
        .bind(&r.user_id)
        .bind(&r.workspace_id)
        .bind(&r.status)
        .bind(&r.price_id)
        .bind(r.cancel_at_period_end)
        .bind(r.current_period_start)
        .bind(r.current_period_end)
        .bind(&r.last_event_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KeyStore for PgStore {
    async fn find_key(&self, workspace_id: &str) -> Result<Option<Vec<u8>>> {
        let encoded = sqlx::query_scalar::<_, String>(
            "SELECT key_b64 FROM workspace_keys WHERE workspace_id = $1",
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        encoded
            .map(|b64| BASE64.decode(b64.as_bytes()))
            .transpose()
            .context("workspace key is not valid base64")
    }

    async fn insert_key(&self, workspace_id: &str, key: &[u8]) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO workspace_keys (workspace_id, key_b64)
            VALUES ($1, $2)
            ON CONFLICT (workspace_id) DO NOTHING
            "#,
        )
        .bind(workspace_id)
        .bind(BASE64.encode(key))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
