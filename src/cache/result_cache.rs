use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::Chain;
use crate::cache::{CacheStats, Clock, TtlCache};
use crate::config::CacheConfig;
use crate::logging::MetricsLogger;
use crate::models::{normalize_address, GraphResult, TimeWindow};

pub fn result_key(chain: Chain, address: &str, window: TimeWindow) -> String {
    format!("{}-{}-{}", chain, normalize_address(address, chain), window)
}

/// Short-lived cache of finished trader graphs
#[derive(Debug)]
pub struct ResultCache {
    inner: TtlCache<GraphResult>,
}

impl ResultCache {
    pub fn new(ttl: Duration, check_period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: TtlCache::new("trader_graphs", ttl, clock).with_check_period(check_period),
        }
    }

    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Duration::from_secs(config.result_ttl_seconds),
            Duration::from_secs(config.result_check_period_seconds),
            clock,
        )
    }

    pub fn get(&self, key: &str) -> Option<GraphResult> {
        let result = self.inner.get(key);
        MetricsLogger::log_cache_event("trader_graphs", key, result.is_some());
        result
    }

    pub fn store(&self, key: String, graph: GraphResult) {
        self.inner.insert(key, graph);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
