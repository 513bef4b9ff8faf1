//! Bounded sequential batch engine shared by the news workers.
//!
//! A worker selects at most `limit` candidates (oversampling the store to
//! absorb filtered rows), then hands them to [`run_sequential`]. Every
//! candidate lands in exactly one of `updated`, `skipped` or `failed`, so
//! the three counts always sum to [`BatchOutcome::attempted`].

use std::future::Future;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Terminal state of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemResult {
    /// Written successfully; the value is the report entry.
    Updated(Value),
    /// Precondition not met. Expected, not an error.
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failed {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub updated: Vec<Value>,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<Failed>,
}

impl BatchOutcome {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn error_count(&self) -> usize {
        self.failed.len()
    }

    pub fn attempted(&self) -> usize {
        self.updated_count() + self.skipped_count() + self.error_count()
    }

    /// Error messages only, for reports that list failures as strings.
    pub fn error_messages(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.error.clone()).collect()
    }

    pub fn record(&mut self, id: String, result: ItemResult) {
        match result {
            ItemResult::Updated(entry) => self.updated.push(entry),
            ItemResult::Skipped(reason) => self.skipped.push(Skipped { id, reason }),
            ItemResult::Failed(error) => self.failed.push(Failed { id, error }),
        }
    }
}

/// Process `items` one at a time, in order. An `Err` from `process` is
/// recorded as a failure for that item and the batch continues.
pub async fn run_sequential<T, I, F, P, Fut>(items: I, id_of: F, mut process: P) -> BatchOutcome
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> String,
    P: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<ItemResult>>,
{
    let mut outcome = BatchOutcome::default();

    for item in items {
        let id = id_of(&item);
        let result = match process(item).await {
            Ok(result) => result,
            Err(e) => ItemResult::Failed(format!("{e:#}")),
        };

        match &result {
            ItemResult::Updated(_) => debug!(id = %id, "Batch item updated"),
            ItemResult::Skipped(reason) => debug!(id = %id, reason = %reason, "Batch item skipped"),
            ItemResult::Failed(error) => warn!(id = %id, error = %error, "Batch item failed"),
        }

        outcome.record(id, result);
    }

    outcome
}

/// Parse a numeric query parameter the way a browser's `Number()` does:
/// blank is 0, anything unparsable is NaN.
fn parse_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.trim_start_matches(['+', '-']) {
        "Infinity" => {
            if trimmed.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        }
        // Rust accepts "inf" and "nan" spellings, `Number()` does not.
        s if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

/// Limit for workers that treat a present-but-invalid value as the minimum:
/// absent → `default`, otherwise `max(1, min(max, n))` with NaN and 0 as 1.
pub fn clamp_limit(raw: Option<&str>, default: u32, max: u32) -> u32 {
    let Some(raw) = raw else {
        return default;
    };
    let n = parse_number(raw);
    let n = if n.is_nan() { 0.0 } else { n };
    n.min(f64::from(max)).max(1.0) as u32
}

/// Limit for workers that treat absent, blank, zero or unparsable input as
/// `default`, then clamp to `1..=max`.
pub fn clamp_limit_or_default(raw: Option<&str>, default: u32, max: u32) -> u32 {
    let n = raw
        .filter(|r| !r.is_empty())
        .map(parse_number)
        .filter(|n| !n.is_nan() && *n != 0.0)
        .unwrap_or(f64::from(default));
    n.max(1.0).min(f64::from(max)) as u32
}

/// How many raw rows to read for a batch of `limit`.
pub fn oversample(limit: u32, factor: u32) -> i64 {
    i64::from(limit) * i64::from(factor.max(1))
}

/// Millisecond-precision UTC timestamp, e.g. `2025-01-01T00:00:00.000Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
