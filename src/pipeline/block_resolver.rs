use std::sync::Arc;

use crate::blockchain::{Chain, ChainDataPort};
use crate::cache::{BlockTimestampCache, BlockTimestampEntry};
use crate::error::UpstreamError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::pipeline::{BatchReport, Throttle};

pub const DEFAULT_MAX_SEARCH_ITERATIONS: u32 = 30;

/// Result of a timestamp to block search
#[derive(Debug, Clone)]
pub struct BlockSearch {
    /// Closest block among those inspected
    pub block_number: u64,
    pub latest_block: u64,
    pub iterations: u32,
    /// An inspected block sits on the target timestamp exactly
    pub exact: bool,
    pub report: BatchReport,
}

/// Maps Unix timestamps to block numbers by binary search over block times
pub struct BlockTimestampResolver {
    port: Arc<dyn ChainDataPort>,
    cache: Arc<BlockTimestampCache>,
    throttle: Throttle,
    max_iterations: u32,
}

impl BlockTimestampResolver {
    pub fn new(
        port: Arc<dyn ChainDataPort>,
        cache: Arc<BlockTimestampCache>,
        throttle: Throttle,
        max_iterations: u32,
    ) -> Self {
        Self {
            port,
            cache,
            throttle,
            max_iterations,
        }
    }

    pub async fn latest_block(&self, chain: Chain) -> Result<u64, UpstreamError> {
        self.throttle
            .run("eth_blockNumber", self.port.get_latest_block_number(chain))
            .await
    }

    /// Block time from the cache, fetching and caching it on a miss
    pub async fn block_timestamp(&self, chain: Chain, block_number: u64) -> Result<BlockTimestampEntry, UpstreamError> {
        if let Some(entry) = self.cache.get(chain, block_number) {
            return Ok(entry);
        }

        let block = self
            .throttle
            .run("eth_getBlockByNumber", self.port.get_block(chain, block_number))
            .await?;

        self.cache.record(chain, &block).ok_or_else(|| {
            UpstreamError::InvalidResponse(format!("Block {} has an unusable timestamp", block_number))
        })
    }

    /// Finds the block whose timestamp is closest to `target_timestamp`.
    ///
    /// Only failing to read the chain head is an error. Block lookups that fail
    /// move the lower bound past them, and the best block seen so far is
    /// returned when the search runs out of iterations.
    pub async fn find_block_near_timestamp(
        &self,
        target_timestamp: i64,
        chain: Chain,
    ) -> Result<BlockSearch, UpstreamError> {
        let monitor = PerformanceMonitor::new("find_block_near_timestamp")
            .with_metadata("chain", serde_json::json!(chain.key()))
            .with_metadata("target_timestamp", serde_json::json!(target_timestamp));
        let context = LogContext::new("block_resolver", "find_block_near_timestamp")
            .with_chain(chain.key())
            .with_metadata("target_timestamp", serde_json::json!(target_timestamp));

        let latest_block = self.latest_block(chain).await?;

        let mut report = BatchReport::new("block_search");
        let mut low = 0u64;
        let mut high = latest_block;
        let mut best = latest_block;
        let mut best_diff = u64::MAX;
        let mut iterations = 0u32;
        let mut exact = false;

        while low <= high && iterations < self.max_iterations {
            iterations += 1;
            let mid = low + (high - low) / 2;

            let timestamp = match self.block_timestamp(chain, mid).await {
                Ok(entry) => {
                    report.completed(format!("block {}", mid));
                    entry.unix_timestamp
                }
                Err(e) => {
                    context
                        .clone()
                        .with_block_number(mid)
                        .debug(&format!("Block lookup failed, skipping past block {}: {}", mid, e));
                    report.failed(format!("block {}", mid), &e);
                    low = mid + 1;
                    continue;
                }
            };

            let diff = timestamp.abs_diff(target_timestamp);
            if diff < best_diff {
                best_diff = diff;
                best = mid;
            }

            if timestamp == target_timestamp {
                exact = true;
                break;
            } else if timestamp < target_timestamp {
                low = mid + 1;
            } else if mid == 0 {
                break;
            } else {
                high = mid - 1;
            }
        }

        monitor.finish();
        MetricsLogger::log_block_search(chain.key(), best, iterations, exact);
        report.log_summary(context.with_block_number(best));

        Ok(BlockSearch {
            block_number: best,
            latest_block,
            iterations,
            exact,
            report,
        })
    }
}
