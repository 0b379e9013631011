pub mod batch_fetcher;
pub mod block_resolver;
pub mod enricher;
pub mod report;
pub mod service;
pub mod throttle;

pub use batch_fetcher::{BatchFetcher, Ceiling, FetchLimits, FetchOutcome};
pub use block_resolver::{BlockSearch, BlockTimestampResolver, DEFAULT_MAX_SEARCH_ITERATIONS};
pub use enricher::{EnrichLimits, EnrichmentReport, RecoveryBudget, TimestampEnricher, DEFAULT_RECOVERY_LIMIT};
pub use report::{BatchReport, UnitOutcome, UnitReport};
pub use service::{CacheReport, MemoryReport, TraderGraphService};
pub use throttle::{pause, with_deadline, DelayPolicy, Throttle};
