use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::blockchain::{Chain, ChainDataPort};
use crate::cache::BlockTimestampCache;
use crate::config::PipelineConfig;
use crate::error::UpstreamError;
use crate::logging::{LogContext, MetricsLogger};
use crate::models::TransferRecord;
use crate::pipeline::{pause, BatchReport, Throttle};

pub const DEFAULT_RECOVERY_LIMIT: usize = 50;

/// Block and ISO timestamp a transaction hash resolved to
type Recovered = (u64, String);

/// Caps hash-based timestamp recoveries across one request.
///
/// Each hash is charged once. Later passes over the same hash reuse the
/// earlier outcome instead of asking upstream again.
#[derive(Debug, Clone)]
pub struct RecoveryBudget {
    limit: usize,
    attempts: HashMap<String, Option<Recovered>>,
}

impl Default for RecoveryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_RECOVERY_LIMIT)
    }
}

impl RecoveryBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            attempts: HashMap::new(),
        }
    }

    /// Charges `hash` against the budget. False once the budget is spent.
    pub fn try_take(&mut self, hash: &str) -> bool {
        if self.attempts.len() >= self.limit {
            return false;
        }
        self.attempts.insert(hash.to_string(), None);
        true
    }

    /// Outcome of an earlier attempt on `hash`: None if never attempted,
    /// Some(None) if that attempt failed
    pub fn attempt(&self, hash: &str) -> Option<Option<Recovered>> {
        self.attempts.get(hash).cloned()
    }

    fn succeed(&mut self, hash: &str, recovered: Recovered) {
        self.attempts.insert(hash.to_string(), Some(recovered));
    }

    pub fn used(&self) -> usize {
        self.attempts.len()
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.attempts.len())
    }
}

/// What one enrichment pass did
#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    pub blocks_cached: usize,
    pub blocks_fetched: usize,
    pub blocks_failed: usize,
    /// Transfers that received a timestamp from a block lookup
    pub applied: usize,
    /// Transfers whose block and timestamp were recovered from their hash
    pub recovered: usize,
    /// Transfers left without a timestamp because the budget ran out
    pub recovery_skipped: usize,
    pub report: BatchReport,
}

impl EnrichmentReport {
    pub fn merge(&mut self, other: EnrichmentReport) {
        self.blocks_cached += other.blocks_cached;
        self.blocks_fetched += other.blocks_fetched;
        self.blocks_failed += other.blocks_failed;
        self.applied += other.applied;
        self.recovered += other.recovered;
        self.recovery_skipped += other.recovery_skipped;
        self.report.merge(other.report);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnrichLimits {
    pub chunk_size: usize,
    pub concurrency: usize,
    pub group_delay_ms: u64,
    pub chunk_delay_ms: u64,
}

impl Default for EnrichLimits {
    fn default() -> Self {
        Self {
            chunk_size: 30,
            concurrency: 5,
            group_delay_ms: 50,
            chunk_delay_ms: 150,
        }
    }
}

impl EnrichLimits {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            chunk_size: config.enrich_chunk_size.max(1),
            concurrency: config.enrich_concurrency.max(1),
            group_delay_ms: config.enrich_group_delay_ms,
            chunk_delay_ms: config.enrich_chunk_delay_ms,
        }
    }
}

/// Fills in transfer timestamps from block times
pub struct TimestampEnricher {
    port: Arc<dyn ChainDataPort>,
    cache: Arc<BlockTimestampCache>,
    throttle: Throttle,
    limits: EnrichLimits,
}

impl TimestampEnricher {
    pub fn new(
        port: Arc<dyn ChainDataPort>,
        cache: Arc<BlockTimestampCache>,
        throttle: Throttle,
        limits: EnrichLimits,
    ) -> Self {
        Self {
            port,
            cache,
            throttle,
            limits,
        }
    }

    /// Sets `timestamp` on every transfer whose block time can be found.
    ///
    /// Transfers still missing one afterwards are recovered through their
    /// transaction hash while `budget` allows, which also backfills
    /// `block_number`. Lookup failures only leave timestamps empty.
    pub async fn enrich(
        &self,
        transfers: &mut [&mut TransferRecord],
        chain: Chain,
        budget: &mut RecoveryBudget,
    ) -> EnrichmentReport {
        let mut outcome = EnrichmentReport {
            report: BatchReport::new("timestamp_enrichment"),
            ..Default::default()
        };
        if transfers.is_empty() {
            return outcome;
        }

        let context = LogContext::new("enricher", "enrich")
            .with_chain(chain.key())
            .with_count("transfers", transfers.len());

        let mut seen = HashSet::new();
        let blocks: Vec<u64> = transfers
            .iter()
            .filter(|t| t.timestamp.is_none())
            .filter_map(|t| t.block_number)
            .filter(|n| seen.insert(*n))
            .collect();

        let mut timestamps: HashMap<u64, String> = HashMap::new();
        let mut to_fetch = Vec::new();
        for block_number in blocks {
            match self.cache.get(chain, block_number) {
                Some(entry) => {
                    timestamps.insert(block_number, entry.iso_timestamp);
                    outcome.blocks_cached += 1;
                }
                None => to_fetch.push(block_number),
            }
        }

        self.fetch_blocks(&to_fetch, chain, &mut timestamps, &mut outcome).await;

        for transfer in transfers.iter_mut() {
            if transfer.timestamp.is_some() {
                continue;
            }
            if let Some(iso) = transfer.block_number.and_then(|n| timestamps.get(&n)) {
                transfer.timestamp = Some(iso.clone());
                outcome.applied += 1;
            }
        }

        self.recover_by_hash(transfers, chain, budget, &mut outcome).await;

        MetricsLogger::log_enrichment(chain.key(), outcome.blocks_cached, outcome.blocks_fetched, outcome.recovered);
        if outcome.recovery_skipped > 0 {
            context
                .clone()
                .with_count("recovery_skipped", outcome.recovery_skipped)
                .info(&format!(
                    "Recovery budget exhausted, {} transfers left without timestamps",
                    outcome.recovery_skipped
                ));
        }
        outcome.report.log_summary(context);

        outcome
    }

    async fn fetch_blocks(
        &self,
        to_fetch: &[u64],
        chain: Chain,
        timestamps: &mut HashMap<u64, String>,
        outcome: &mut EnrichmentReport,
    ) {
        let chunks: Vec<&[u64]> = to_fetch.chunks(self.limits.chunk_size).collect();

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let groups: Vec<&[u64]> = chunk.chunks(self.limits.concurrency).collect();

            for (group_index, group) in groups.iter().enumerate() {
                let lookups = group.iter().map(|&block_number| async move {
                    let result = self
                        .throttle
                        .run("eth_getBlockByNumber", self.port.get_block(chain, block_number))
                        .await;
                    (block_number, result)
                });

                for (block_number, result) in join_all(lookups).await {
                    let unit = format!("block {}", block_number);
                    match result {
                        Ok(block) => match self.cache.record(chain, &block) {
                            Some(entry) => {
                                timestamps.insert(block_number, entry.iso_timestamp);
                                outcome.blocks_fetched += 1;
                                outcome.report.completed(unit);
                            }
                            None => {
                                outcome.blocks_failed += 1;
                                outcome.report.failed(unit, "unusable block timestamp");
                            }
                        },
                        Err(e) => {
                            outcome.blocks_failed += 1;
                            outcome.report.failed(unit, &e);
                        }
                    }
                }

                if group_index + 1 < groups.len() {
                    pause(self.limits.group_delay_ms).await;
                }
            }

            if chunk_index + 1 < chunks.len() {
                pause(self.limits.chunk_delay_ms).await;
            }
        }
    }

    async fn recover_by_hash(
        &self,
        transfers: &mut [&mut TransferRecord],
        chain: Chain,
        budget: &mut RecoveryBudget,
        outcome: &mut EnrichmentReport,
    ) {
        for transfer in transfers.iter_mut() {
            if transfer.timestamp.is_some() || transfer.hash.is_empty() {
                continue;
            }

            let unit = format!("recover {}", transfer.hash);
            match budget.attempt(&transfer.hash) {
                Some(Some((block_number, iso))) => {
                    transfer.block_number = Some(block_number);
                    transfer.timestamp = Some(iso);
                    outcome.recovered += 1;
                    outcome.report.completed(unit);
                    continue;
                }
                Some(None) => continue,
                None => {}
            }

            if !budget.try_take(&transfer.hash) {
                outcome.recovery_skipped += 1;
                outcome.report.skipped(unit, "recovery budget exhausted");
                continue;
            }

            match self.recover_one(chain, &transfer.hash).await {
                Ok((block_number, iso)) => {
                    budget.succeed(&transfer.hash, (block_number, iso.clone()));
                    transfer.block_number = Some(block_number);
                    transfer.timestamp = Some(iso);
                    outcome.recovered += 1;
                    outcome.report.completed(unit);
                }
                Err(e) => {
                    LogContext::new("enricher", "recover_by_hash")
                        .with_chain(chain.key())
                        .with_transaction_hash(&transfer.hash)
                        .debug(&format!("Could not recover timestamp: {}", e));
                    outcome.report.failed(unit, &e);
                }
            }
        }
    }

    async fn recover_one(&self, chain: Chain, hash: &str) -> Result<(u64, String), UpstreamError> {
        let tx = self
            .throttle
            .run("eth_getTransactionByHash", self.port.get_transaction_by_hash(chain, hash))
            .await?;
        let block_number = tx.block_number.ok_or_else(|| {
            UpstreamError::InvalidResponse(format!("Transaction {} is not in a block yet", hash))
        })?;

        if let Some(entry) = self.cache.get(chain, block_number) {
            return Ok((block_number, entry.iso_timestamp));
        }

        let block = self
            .throttle
            .run("eth_getBlockByNumber", self.port.get_block(chain, block_number))
            .await?;
        let entry = self.cache.record(chain, &block).ok_or_else(|| {
            UpstreamError::InvalidResponse(format!("Block {} has an unusable timestamp", block_number))
        })?;

        Ok((block_number, entry.iso_timestamp))
    }
}
