pub mod backfill;
pub mod batch;
pub mod fetch;
pub mod ingest;
pub mod prompts;
pub mod refresh;
pub mod rehydrate;
pub mod score;
pub mod search;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use backfill::{BackfillReport, BackfillWorker, OutletBackfill, OutletConfig};
pub use batch::{BatchOutcome, Failed, ItemResult, Skipped};
pub use fetch::{HttpArticleFetcher, SnapshotFetcher};
pub use ingest::{IngestReport, IngestWorker};
pub use refresh::{NewsCategory, RefreshReport, RefreshWorker};
pub use rehydrate::{RehydrateReport, RehydrateWorker};
pub use score::{ScoreReport, ScoreWorker};
pub use search::TavilySearcher;
pub use traits::{ArticleFetcher, SearchItem, SearchOptions, WebSearcher};
