//! Backfill producer: outlet search results land on the ingest queue.

use std::sync::Arc;

use clarity_store::testing::InMemoryStore;
use clarity_worker::backfill::{default_outlets, QUEUE_SOURCE};
use clarity_worker::testing::{search_item, MockSearcher};
use clarity_worker::{BackfillWorker, IngestWorker, OutletConfig, SearchOptions, SnapshotFetcher};

fn worker(store: Arc<InMemoryStore>, searcher: Arc<MockSearcher>) -> BackfillWorker {
    BackfillWorker::new(store, searcher)
}

#[tokio::test]
async fn queues_search_results_for_requested_outlet() {
    let store = Arc::new(InMemoryStore::new());
    let searcher = Arc::new(MockSearcher::new().on_query(
        "site:npr.org",
        vec![
            search_item("One", "https://www.npr.org/1", ""),
            search_item("No link", "", ""),
            search_item("Two", "https://www.npr.org/2", ""),
        ],
    ));

    let report = worker(store.clone(), searcher.clone())
        .run(30, &["npr.org".to_string()])
        .await;

    assert!(report.ok);
    assert_eq!(report.days, 30);
    assert_eq!(report.total_queued, 2);
    assert_eq!(report.outlets.len(), 1);
    assert_eq!(report.outlets[0].outlet, "npr.org");
    assert_eq!(report.outlets[0].tavily_queued, 2);
    assert_eq!(report.outlets[0].error, None);

    let queued = store.queued_rows();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].story_url.as_deref(), Some("https://www.npr.org/1"));
    assert_eq!(queued[0].outlet.as_deref(), Some("npr.org"));
    assert_eq!(queued[0].source.as_deref(), Some(QUEUE_SOURCE));

    let calls = searcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].1,
        SearchOptions {
            max_results: 150,
            news: true,
            days: Some(30),
        }
    );
}

#[tokio::test]
async fn empty_request_covers_every_tracked_outlet() {
    let store = Arc::new(InMemoryStore::new());
    let searcher = Arc::new(MockSearcher::new());

    let report = worker(store, searcher.clone()).run(90, &[]).await;

    let expected: Vec<_> = default_outlets().into_iter().map(|o| o.canonical).collect();
    let reported: Vec<_> = report.outlets.iter().map(|o| o.outlet.clone()).collect();
    assert_eq!(reported, expected);

    let queries: Vec<_> = searcher.calls().into_iter().map(|(q, _)| q).collect();
    assert_eq!(
        queries,
        expected.iter().map(|d| format!("site:{d}")).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn rerun_counts_duplicates_instead_of_requeueing() {
    let store = Arc::new(InMemoryStore::new());
    let searcher = Arc::new(MockSearcher::new().on_query(
        "site:bbc.com",
        vec![search_item("Story", "https://www.bbc.com/news/1", "")],
    ));
    let worker = worker(store.clone(), searcher);
    let outlets = ["bbc.com".to_string()];

    let first = worker.run(90, &outlets).await;
    let second = worker.run(90, &outlets).await;

    assert_eq!(first.outlets[0].tavily_queued, 1);
    assert_eq!(second.outlets[0].tavily_queued, 0);
    assert_eq!(second.outlets[0].already_queued, 1);
    assert_eq!(store.queued_rows().len(), 1);
}

#[tokio::test]
async fn outlet_failures_do_not_stop_the_run() {
    let store = Arc::new(InMemoryStore::new().fail_enqueue_for("https://reuters.com/bad"));
    let searcher = Arc::new(
        MockSearcher::new()
            .fail_query("site:npr.org")
            .on_query(
                "site:reuters.com",
                vec![
                    search_item("Bad", "https://reuters.com/bad", ""),
                    search_item("Good", "https://reuters.com/good", ""),
                ],
            ),
    );
    let requested = [
        "npr.org".to_string(),
        "unknown.example".to_string(),
        "reuters.com".to_string(),
    ];

    let report = worker(store.clone(), searcher).run(7, &requested).await;

    assert!(report.ok);
    assert!(report.outlets[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("search failed")));
    assert_eq!(report.outlets[1].error.as_deref(), Some("unknown outlet"));
    assert_eq!(report.outlets[2].tavily_queued, 1);
    assert_eq!(report.outlets[2].failed, 1);
    assert_eq!(report.total_queued, 1);
}

#[tokio::test]
async fn zero_days_is_raised_to_one() {
    let store = Arc::new(InMemoryStore::new());
    let searcher = Arc::new(MockSearcher::new());
    let worker = worker(store, searcher.clone())
        .with_outlets(vec![OutletConfig::site("apnews.com", 20)]);

    let report = worker.run(0, &[]).await;

    assert_eq!(report.days, 1);
    assert_eq!(searcher.calls()[0].1.days, Some(1));
    assert_eq!(searcher.calls()[0].1.max_results, 20);
}

#[tokio::test]
async fn queued_rows_feed_the_ingest_worker() {
    let store = Arc::new(InMemoryStore::new());
    let searcher = Arc::new(MockSearcher::new().on_query(
        "site:nytimes.com",
        vec![search_item("Story", "https://www.nytimes.com/a", "")],
    ));
    worker(store.clone(), searcher)
        .run(90, &["nytimes.com".to_string()])
        .await;

    let fetcher = clarity_worker::testing::MockFetcher::new()
        .on_page("https://www.nytimes.com/a", "<p>Council approved the budget.</p>");
    let ingest = IngestWorker::new(
        store.clone(),
        SnapshotFetcher::new(Arc::new(fetcher)),
        "global_news",
        3,
    );
    let report = ingest.run(5).await.unwrap();

    assert_eq!(report.ingested, 1);
    assert!(store.queued_rows().is_empty());
    let fact = &store.inserted_facts()[0];
    assert_eq!(fact.raw_url, "https://www.nytimes.com/a");
    assert_eq!(fact.raw_snapshot.as_deref(), Some("Council approved the budget."));
}
