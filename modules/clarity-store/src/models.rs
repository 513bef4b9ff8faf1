use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use clarity_common::BiasScores;

pub const NEWS_DOMAIN: &str = "news";
pub const NEWS_STORY_CATEGORY: &str = "news_story";
pub const SYSTEM_USER_KEY: &str = "system-news-anchor";

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

/// Row from `truth_facts`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TruthFact {
    pub id: Uuid,
    pub workspace_id: Option<String>,
    pub user_key: Option<String>,
    pub user_id: Option<String>,
    pub query: Option<String>,
    pub summary: Option<String>,
    pub scientific_domain: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub raw_url: Option<String>,
    pub raw_snapshot: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a `truth_facts` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTruthFact {
    pub workspace_id: String,
    pub user_key: String,
    pub query: Option<String>,
    pub summary: Option<String>,
    pub scientific_domain: String,
    pub category: String,
    pub status: String,
    pub confidence_level: Option<String>,
    pub pi_score: Option<f64>,
    pub sources: serde_json::Value,
    pub raw_url: String,
    pub raw_snapshot: Option<String>,
}

/// Parameters for inserting a `neutrality_ledger` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub workspace_id: String,
    pub user_key: String,
    pub user_id: Option<String>,
    pub truth_fact_id: Option<Uuid>,
    pub story_id: String,
    pub story_title: String,
    pub story_url: Option<String>,
    pub outlet: Option<String>,
    pub category: String,
    pub raw_story: Option<String>,
    pub neutral_summary: Option<String>,
    pub notes: Option<String>,
    pub scores: BiasScores,
}

/// Row from `solace_news_digest_view`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DigestRow {
    pub ledger_id: Uuid,
    pub truth_fact_id: Option<Uuid>,
    pub story_title: Option<String>,
    pub story_url: Option<String>,
    pub outlet: Option<String>,
    pub neutral_summary: Option<String>,
    pub key_facts: Option<serde_json::Value>,
    pub bias_language_score: Option<f64>,
    pub bias_source_score: Option<f64>,
    pub bias_framing_score: Option<f64>,
    pub bias_context_score: Option<f64>,
    pub bias_intent_score: Option<f64>,
    pub pi_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub day: Option<NaiveDate>,
}

/// Row from `news_backfill_queue`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueRow {
    pub id: Uuid,
    pub outlet: Option<String>,
    pub story_url: Option<String>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row from `outlet_bias_pi_daily_trends`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutletTrendPoint {
    pub story_day: NaiveDate,
    pub outlet_story_count: i64,
    pub avg_bias_intent: Option<f64>,
    pub avg_pi_score: Option<f64>,
    pub avg_bias_language: Option<f64>,
    pub avg_bias_source: Option<f64>,
    pub avg_bias_framing: Option<f64>,
    pub avg_bias_context: Option<f64>,
}

/// Row from `outlet_bias_pi_overview`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutletOverview {
    pub canonical_outlet: String,
    pub total_stories: i64,
    pub days_active: i64,
    pub last_story_day: Option<NaiveDate>,
    pub avg_pi_weighted: Option<f64>,
    pub avg_bias_intent_weighted: Option<f64>,
    pub avg_bias_language_weighted: Option<f64>,
    pub avg_bias_source_weighted: Option<f64>,
    pub avg_bias_framing_weighted: Option<f64>,
    pub avg_bias_context_weighted: Option<f64>,
}

/// Row from `outlet_neutrality_aggregates`: lifetime per-outlet averages.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutletNeutralityRow {
    pub outlet: String,
    pub story_count: i64,
    pub avg_bias_intent_score: Option<f64>,
    pub bias_intent_score_stddev: Option<f64>,
    pub avg_pi_score: Option<f64>,
    pub first_scored_at: Option<DateTime<Utc>>,
    pub last_scored_at: Option<DateTime<Utc>>,
}

/// Leaderboard ordering. Both sort descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutletSort {
    /// Most scored stories first.
    #[default]
    Stories,
    /// Highest average PI first.
    Neutrality,
}

impl OutletSort {
    /// Anything other than `"neutrality"` sorts by story count.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("neutrality") => OutletSort::Neutrality,
            _ => OutletSort::Stories,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutletSort::Stories => "stories",
            OutletSort::Neutrality => "neutrality",
        }
    }
}

/// URL to place on `news_backfill_queue`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueItem {
    pub outlet: String,
    pub story_url: String,
    pub source: String,
}

// ---------------------------------------------------------------------------
// Rolodex
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: String,
    pub workspace_id: Option<String>,
    pub name: String,
    pub relationship_type: Option<String>,
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relationship_type: Option<String>,
    #[serde(default)]
    pub primary_email: Option<String>,
    #[serde(default)]
    pub primary_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewContact {
    /// Blank optional strings become `NULL`.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        for field in [
            &mut self.workspace_id,
            &mut self.relationship_type,
            &mut self.primary_email,
            &mut self.primary_phone,
            &mut self.notes,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }
}

/// Partial update. An absent key leaves the column alone, an explicit
/// `null` clears it. Unknown keys (including `user_id`) are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
    #[serde(default, deserialize_with = "present")]
    pub workspace_id: Option<Option<String>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub relationship_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub primary_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub primary_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
}

impl ContactPatch {
    pub fn normalized(mut self) -> Self {
        if let Some(Some(ws)) = &self.workspace_id {
            if ws.is_empty() {
                self.workspace_id = Some(None);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.workspace_id.is_none()
            && self.name.is_none()
            && self.relationship_type.is_none()
            && self.primary_email.is_none()
            && self.primary_phone.is_none()
            && self.notes.is_none()
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Memories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Episodic,
    Autobiographical,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Episodic => "episodic",
            MemoryType::Autobiographical => "autobiographical",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fact" => Ok(MemoryType::Fact),
            "episodic" => Ok(MemoryType::Episodic),
            "autobiographical" => Ok(MemoryType::Autobiographical),
            other => Err(format!("unknown memory_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: String,
    pub workspace_id: String,
    pub memory_type: String,
    pub content: String,
    pub source: String,
    pub source_confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub workspace_id: String,
    pub memory_type: MemoryType,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

/// Subscription state keyed by the provider's subscription id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionRecord {
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub status: String,
    pub price_id: Option<String>,
    pub cancel_at_period_end: Option<bool>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub last_event_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let patch: ContactPatch =
            serde_json::from_str(r#"{"notes": null, "name": "Ada"}"#).unwrap();
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.primary_email, None);
        assert_eq!(patch.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn patch_drops_user_id_and_is_empty() {
        let patch: ContactPatch =
            serde_json::from_str(r#"{"user_id": "someone-else"}"#).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn patch_empty_workspace_becomes_null() {
        let patch: ContactPatch = serde_json::from_str(r#"{"workspace_id": ""}"#).unwrap();
        let patch = patch.normalized();
        assert_eq!(patch.workspace_id, Some(None));
        assert!(!patch.is_empty());
    }

    #[test]
    fn new_contact_blanks_become_none() {
        let contact: NewContact = serde_json::from_str(
            r#"{"name": "  Grace ", "primary_email": " ", "workspace_id": ""}"#,
        )
        .unwrap();
        let contact = contact.normalized();
        assert_eq!(contact.name, "Grace");
        assert_eq!(contact.primary_email, None);
        assert_eq!(contact.workspace_id, None);
    }

    #[test]
    fn memory_type_parsing() {
        assert_eq!("fact".parse::<MemoryType>().unwrap(), MemoryType::Fact);
        assert_eq!(
            "autobiographical".parse::<MemoryType>().unwrap().as_str(),
            "autobiographical"
        );
        assert!("dream".parse::<MemoryType>().is_err());
        assert!("Fact".parse::<MemoryType>().is_err());
    }
}
