pub mod api;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;

pub use blockchain::{AlchemyClient, Chain, ChainDataPort};
pub use cache::{Clock, ManualClock, SystemClock};
pub use config::{ApiConfig, AppConfig, CacheConfig, LoggingConfig, PipelineConfig, ProviderConfig};
pub use error::{GraphError, Result};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{GraphResult, TimeWindow, TraderQueryOutcome};
pub use pipeline::TraderGraphService;
