use chrono::{DateTime, SecondsFormat};
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::{BlockInfo, Chain};
use crate::cache::{CacheStats, Clock, TtlCache};
use crate::config::CacheConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTimestampEntry {
    pub block_number: u64,
    pub unix_timestamp: i64,
    pub iso_timestamp: String,
}

impl BlockTimestampEntry {
    pub fn from_block(block: &BlockInfo) -> Option<Self> {
        Some(Self {
            block_number: block.number,
            unix_timestamp: block.timestamp,
            iso_timestamp: format_unix_timestamp(block.timestamp)?,
        })
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-03-01T12:00:00.000Z`
pub fn format_unix_timestamp(unix_seconds: i64) -> Option<String> {
    DateTime::from_timestamp(unix_seconds, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn block_key(chain: Chain, block_number: u64) -> String {
    format!("block-{}-{}", chain, block_number)
}

/// Long-lived block number to timestamp cache shared by the resolver and enricher
#[derive(Debug)]
pub struct BlockTimestampCache {
    inner: TtlCache<BlockTimestampEntry>,
}

impl BlockTimestampCache {
    pub fn new(ttl: Duration, check_period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: TtlCache::new("block_timestamps", ttl, clock).with_check_period(check_period),
        }
    }

    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Duration::from_secs(config.block_ttl_seconds),
            Duration::from_secs(config.block_check_period_seconds),
            clock,
        )
    }

    pub fn get(&self, chain: Chain, block_number: u64) -> Option<BlockTimestampEntry> {
        self.inner.get(&block_key(chain, block_number))
    }

    /// Stores a fetched block. Returns None if its timestamp cannot be represented.
    pub fn record(&self, chain: Chain, block: &BlockInfo) -> Option<BlockTimestampEntry> {
        let Some(entry) = BlockTimestampEntry::from_block(block) else {
            log::warn!(
                "Block {} on {} has an out-of-range timestamp {}",
                block.number,
                chain,
                block.timestamp
            );
            return None;
        };
        self.inner.insert(block_key(chain, block.number), entry.clone());
        Some(entry)
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
