//! Score worker end to end: selection, model calls and ledger writes.

use std::sync::Arc;

use clarity_store::testing::{news_fact, InMemoryStore};
use clarity_worker::testing::{scoring_reply, MockGenerator};
use clarity_worker::ScoreWorker;

const MODEL: &str = "gpt-4o";

fn worker(store: Arc<InMemoryStore>, generator: MockGenerator) -> ScoreWorker {
    ScoreWorker::new(store, Arc::new(generator), MODEL, 3)
}

#[tokio::test]
async fn scores_unscored_facts_and_reports_each_outcome() {
    let fresh = news_fact("https://www.reuters.com/a", Some("Markets rallied on Tuesday."), 1);
    let scored = news_fact("https://apnews.com/b", Some("Already scored."), 2);
    let empty = news_fact("https://bbc.co.uk/c", None, 3);
    let rejected = news_fact("https://npr.org/d", Some("Ledger refuses this one."), 4);
    let store = Arc::new(
        InMemoryStore::new()
            .with_fact(fresh.clone())
            .with_ledger_for(scored.id)
            .with_fact(scored.clone())
            .with_fact(empty.clone())
            .with_fact(rejected.clone())
            .fail_ledger_for("https://npr.org/d"),
    );
    let generator = MockGenerator::new().otherwise(scoring_reply(1.0, 0.9));

    let report = worker(store.clone(), generator).run(10).await.unwrap();

    assert!(report.ok);
    assert_eq!(report.model, MODEL);
    assert_eq!(report.total_candidates, 3);
    assert_eq!(report.skipped_existing, 1);
    assert_eq!(report.scored, 1);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, empty.id.to_string());
    assert_eq!(report.skipped[0].reason, "empty body");

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with(&format!("Insert error for truth_fact_id={}", rejected.id)));

    assert_eq!(report.details.len(), 1);
    assert_eq!(report.details[0]["truth_fact_id"], fresh.id.to_string());
    assert_eq!(report.details[0]["outlet"], "reuters.com");
    assert_eq!(report.details[0]["bias_intent_score"], 1.0);
    assert_eq!(report.details[0]["pi_score"], 0.9);

    assert_eq!(report.updated_count, 1);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(report.error_count, 1);
    assert_eq!(
        report.updated_count + report.skipped_count + report.error_count,
        report.total_candidates
    );
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["updatedCount"], 1);
    assert_eq!(json["skippedCount"], 1);
    assert_eq!(json["errorCount"], 1);
    assert_eq!(json["skippedExisting"], 1);

    // Seeded row plus the new one.
    let ledger = store.ledger_entries();
    assert_eq!(ledger.len(), 2);
    let written = &ledger[1];
    assert_eq!(written.truth_fact_id, Some(fresh.id));
    assert_eq!(written.story_id, "https://www.reuters.com/a");
    assert_eq!(written.outlet.as_deref(), Some("reuters.com"));
    assert_eq!(written.category, "news");
    assert_eq!(written.scores.bias_intent_score, 1.0);
    assert_eq!(
        written.neutral_summary.as_deref(),
        Some("A neutral account of the events described.")
    );
}

#[tokio::test]
async fn model_failure_is_reported_per_fact() {
    let fact = news_fact("https://reuters.com/a", Some("Body text."), 1);
    let store = Arc::new(InMemoryStore::new().with_fact(fact.clone()));
    let generator = MockGenerator::new().otherwise("I cannot score this.");

    let report = worker(store.clone(), generator).run(5).await.unwrap();

    assert_eq!(report.scored, 0);
    assert_eq!(report.error_count, 1);
    assert_eq!(
        report.errors,
        vec![format!("No scoring result for truth_fact_id={}", fact.id)]
    );
    assert!(store.ledger_entries().is_empty());
}

#[tokio::test]
async fn second_run_finds_nothing_to_score() {
    let store = Arc::new(
        InMemoryStore::new()
            .with_fact(news_fact("https://reuters.com/a", Some("One."), 1))
            .with_fact(news_fact("https://reuters.com/b", Some("Two."), 2)),
    );
    let worker = worker(store.clone(), MockGenerator::new().otherwise(scoring_reply(2.0, 0.4)));

    let first = worker.run(5).await.unwrap();
    assert_eq!(first.scored, 2);

    let second = worker.run(5).await.unwrap();
    assert_eq!(second.total_candidates, 0);
    assert_eq!(second.skipped_existing, 2);
    assert_eq!(store.ledger_entries().len(), 2);
}

#[tokio::test]
async fn limit_caps_candidates_newest_first() {
    let facts: Vec<_> = (0..5)
        .map(|i| news_fact(&format!("https://reuters.com/{i}"), Some("Body."), i))
        .collect();
    let store = facts
        .iter()
        .fold(InMemoryStore::new(), |s, f| s.with_fact(f.clone()));
    let store = Arc::new(store);

    let report = worker(store, MockGenerator::new().otherwise(scoring_reply(1.5, 0.5)))
        .run(2)
        .await
        .unwrap();

    assert_eq!(report.total_candidates, 2);
    let ids: Vec<_> = report
        .details
        .iter()
        .map(|d| d["truth_fact_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![facts[0].id.to_string(), facts[1].id.to_string()]);
}

#[tokio::test]
async fn scoring_request_uses_json_mode_and_includes_story() {
    let fact = news_fact("https://reuters.com/a", Some("The mayor resigned."), 1);
    let store = Arc::new(InMemoryStore::new().with_fact(fact));
    let generator = Arc::new(MockGenerator::new().otherwise(scoring_reply(1.0, 0.5)));
    let worker = ScoreWorker::new(store, generator.clone(), MODEL, 3);

    worker.run(1).await.unwrap();

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].json_mode);
    assert_eq!(requests[0].max_output_tokens, Some(800));
    assert!(requests[0].input.contains("The mayor resigned."));
    assert!(requests[0].input.contains("reuters.com"));
}

#[tokio::test]
async fn store_read_failure_is_fatal() {
    let store = Arc::new(InMemoryStore::new().fail_reads());
    assert!(worker(store, MockGenerator::new()).run(5).await.is_err());
}
