//! Backfill queue ingest: queue rows become news facts, then leave the queue.

use std::sync::Arc;

use clarity_store::testing::{news_fact, queue_row, InMemoryStore};
use clarity_worker::testing::MockFetcher;
use clarity_worker::{IngestWorker, SnapshotFetcher};

const WORKSPACE: &str = "global_news";

fn worker(store: Arc<InMemoryStore>, fetcher: MockFetcher) -> IngestWorker {
    IngestWorker::new(store, SnapshotFetcher::new(Arc::new(fetcher)), WORKSPACE, 3)
}

#[tokio::test]
async fn ingests_pending_rows_and_skips_known_urls() {
    let no_url = queue_row(None, Some("reuters"), 40);
    let known = queue_row(Some("https://apnews.com/known"), Some("apnews"), 30);
    let fresh = queue_row(Some("https://www.bbc.co.uk/news/1"), None, 20);
    let store = Arc::new(
        InMemoryStore::new()
            .with_fact(news_fact("https://apnews.com/known", Some("Old."), 100))
            .with_queue_row(no_url)
            .with_queue_row(known)
            .with_queue_row(fresh.clone()),
    );
    let fetcher = MockFetcher::new().on_page(
        "https://www.bbc.co.uk/news/1",
        "<html><head><style>p{}</style></head><body><p>Flood waters receded.</p></body></html>",
    );

    let report = worker(store.clone(), fetcher).run(10).await.unwrap();

    assert!(report.ok);
    assert_eq!(report.total_candidates, 1);
    assert_eq!(report.ingested, 1);
    assert!(report.skipped.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(report.details[0]["queue_id"], fresh.id.to_string());
    assert_eq!(report.details[0]["story_url"], "https://www.bbc.co.uk/news/1");

    let facts = store.inserted_facts();
    assert_eq!(facts.len(), 1);
    let fact = &facts[0];
    assert_eq!(fact.workspace_id, WORKSPACE);
    assert_eq!(fact.raw_url, "https://www.bbc.co.uk/news/1");
    assert_eq!(fact.query.as_deref(), Some("https://www.bbc.co.uk/news/1"));
    assert_eq!(fact.status, "ingested");
    assert_eq!(fact.raw_snapshot.as_deref(), Some("Flood waters receded."));
    assert_eq!(fact.sources["outlet"], "bbc.co.uk");
    assert_eq!(fact.sources["source"], "rss");
    assert_eq!(fact.sources["backfill"], true);

    assert_eq!(store.deleted_queue_ids(), vec![fresh.id]);
}

#[tokio::test]
async fn unreachable_article_is_skipped_and_stays_queued() {
    let row = queue_row(Some("https://down.example.com/a"), None, 5);
    let store = Arc::new(InMemoryStore::new().with_queue_row(row.clone()));

    let report = worker(store.clone(), MockFetcher::new()).run(10).await.unwrap();

    assert_eq!(report.ingested, 0);
    assert_eq!((report.updated_count, report.skipped_count, report.error_count), (0, 1, 0));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, row.id.to_string());
    assert_eq!(report.skipped[0].reason, "empty snapshot");
    assert!(store.inserted_facts().is_empty());
    assert!(store.deleted_queue_ids().is_empty());
}

#[tokio::test]
async fn failed_queue_delete_does_not_fail_the_row() {
    let row = queue_row(Some("https://npr.org/a"), Some("npr"), 5);
    let store = Arc::new(InMemoryStore::new().with_queue_row(row).fail_queue_delete());
    let fetcher = MockFetcher::new().on_page("https://npr.org/a", "Plain text body.");

    let report = worker(store.clone(), fetcher).run(10).await.unwrap();

    assert_eq!(report.ingested, 1);
    assert!(report.errors.is_empty());
    assert_eq!(store.inserted_facts()[0].sources["outlet"], "npr");
}

#[tokio::test]
async fn insert_failure_is_reported_with_queue_id() {
    let row = queue_row(Some("https://npr.org/a"), None, 5);
    let store = Arc::new(
        InMemoryStore::new()
            .with_queue_row(row.clone())
            .fail_fact_for("https://npr.org/a"),
    );
    let fetcher = MockFetcher::new().on_page("https://npr.org/a", "Body.");

    let report = worker(store.clone(), fetcher).run(10).await.unwrap();

    assert_eq!(report.ingested, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with(&format!(
        "Failed to ingest queue_id={} url=https://npr.org/a",
        row.id
    )));
    assert!(store.deleted_queue_ids().is_empty());
}

#[tokio::test]
async fn limit_takes_oldest_rows_first() {
    let rows: Vec<_> = (0..4)
        .map(|i| queue_row(Some(&format!("https://npr.org/{i}")), None, 100 - i))
        .collect();
    let mut fetcher = MockFetcher::new();
    for i in 0..4 {
        fetcher = fetcher.on_page(&format!("https://npr.org/{i}"), "Body.");
    }
    let store = rows
        .iter()
        .fold(InMemoryStore::new(), |s, r| s.with_queue_row(r.clone()));
    let store = Arc::new(store);

    let report = worker(store.clone(), fetcher).run(2).await.unwrap();

    assert_eq!(report.total_candidates, 2);
    assert_eq!(store.deleted_queue_ids(), vec![rows[0].id, rows[1].id]);
}
