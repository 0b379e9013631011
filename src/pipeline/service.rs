use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::blockchain::{BlockTag, Chain, ChainDataPort, TransferFilter};
use crate::cache::{result_key, BlockTimestampCache, Clock, ResultCache};
use crate::config::{AppConfig, PipelineConfig};
use crate::error::{GraphError, Result};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{
    validate_address, BuildInputs, EmptyGraph, GraphBuilder, TimeWindow, TraderAggregator, TraderQueryOutcome,
    TransferRecord,
};
use crate::pipeline::{
    pause, BatchFetcher, BlockTimestampResolver, EnrichLimits, EnrichmentReport, FetchLimits, RecoveryBudget,
    Throttle, TimestampEnricher,
};

/// Cache figures reported by `/memory`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub block_timestamp_cache_size: usize,
    pub request_cache_size: usize,
    pub block_timestamp_hits: u64,
    pub block_timestamp_misses: u64,
    pub request_hits: u64,
    pub request_misses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    pub cache_stats: CacheReport,
}

/// Runs trader queries end to end and owns the shared caches and throttles
pub struct TraderGraphService {
    port: Arc<dyn ChainDataPort>,
    clock: Arc<dyn Clock>,
    block_cache: Arc<BlockTimestampCache>,
    result_cache: Arc<ResultCache>,
    transfer_throttle: Throttle,
    resolver: BlockTimestampResolver,
    fetcher: BatchFetcher,
    enricher: TimestampEnricher,
    aggregator: TraderAggregator,
    builder: GraphBuilder,
    pipeline: PipelineConfig,
}

impl TraderGraphService {
    pub fn new(port: Arc<dyn ChainDataPort>, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let block_cache = Arc::new(BlockTimestampCache::from_config(&config.cache, clock.clone()));
        let result_cache = Arc::new(ResultCache::from_config(&config.cache, clock.clone()));
        Self::with_caches(port, &config.pipeline, block_cache, result_cache, clock)
    }

    pub fn with_caches(
        port: Arc<dyn ChainDataPort>,
        pipeline: &PipelineConfig,
        block_cache: Arc<BlockTimestampCache>,
        result_cache: Arc<ResultCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let call_timeout = pipeline.call_timeout();
        let transfer_throttle = Throttle::new("transfers", pipeline.fetch_group_size, call_timeout);
        let block_throttle = Throttle::new("blocks", pipeline.enrich_concurrency, call_timeout);

        let resolver = BlockTimestampResolver::new(
            port.clone(),
            block_cache.clone(),
            block_throttle.clone(),
            pipeline.block_search_max_iterations,
        );
        let fetcher = BatchFetcher::new(
            port.clone(),
            transfer_throttle.clone(),
            FetchLimits::from_config(pipeline),
        );
        let enricher = TimestampEnricher::new(
            port.clone(),
            block_cache.clone(),
            block_throttle,
            EnrichLimits::from_config(pipeline),
        );

        Self {
            port,
            clock,
            block_cache,
            result_cache,
            transfer_throttle,
            resolver,
            fetcher,
            enricher,
            aggregator: TraderAggregator::new(pipeline.max_transactions_per_trader),
            builder: GraphBuilder::new(pipeline.top_traders),
            pipeline: pipeline.clone(),
        }
    }

    pub fn block_cache(&self) -> &Arc<BlockTimestampCache> {
        &self.block_cache
    }

    pub fn result_cache(&self) -> &Arc<ResultCache> {
        &self.result_cache
    }

    pub fn resolver(&self) -> &BlockTimestampResolver {
        &self.resolver
    }

    /// Builds the trader graph for a token contract over a time window.
    ///
    /// Finished graphs are cached per chain, address and window. An empty
    /// window yields `TraderQueryOutcome::Empty`, which is not cached.
    pub async fn query(&self, address: &str, window: TimeWindow, chain: Chain) -> Result<TraderQueryOutcome> {
        let address = address.trim();
        validate_address(address, chain)?;

        let key = result_key(chain, address, window);
        if let Some(graph) = self.result_cache.get(&key) {
            return Ok(TraderQueryOutcome::Graph(graph));
        }

        let monitor = PerformanceMonitor::new("trader_query")
            .with_metadata("chain", serde_json::json!(chain.key()))
            .with_metadata("window", serde_json::json!(window.as_str()));
        let context = LogContext::new("trader_service", "query")
            .with_chain(chain.key())
            .with_address(address)
            .with_metadata("window", serde_json::json!(window.as_str()));
        context.info(&format!(
            "Processing request for {} on {} with time filter: {}",
            address, chain, window
        ));

        self.check_activity(address, chain).await?;

        let (from_block, latest_block) = match window.start_timestamp(self.clock.unix_now()) {
            Some(target) => {
                let search = self.resolver.find_block_near_timestamp(target, chain).await?;
                (search.block_number, search.latest_block)
            }
            None => (0, self.resolver.latest_block(chain).await?),
        };

        let filter = TransferFilter::for_contract(address, self.pipeline.page_size)
            .with_range(BlockTag::Number(from_block), BlockTag::Number(latest_block));
        let fetched = self.fetcher.fetch_all(&filter, chain).await?;
        let mut transfers = fetched.transfers;

        context
            .clone()
            .with_count("transfers", transfers.len())
            .with_metadata("from_block", serde_json::json!(from_block))
            .with_metadata("latest_block", serde_json::json!(latest_block))
            .info(&format!("Fetched {} transfers", transfers.len()));

        if transfers.is_empty() {
            return Ok(TraderQueryOutcome::Empty(EmptyGraph::no_transfers(chain)));
        }

        let preliminary = self.aggregator.fold(&transfers);
        if preliminary.is_empty() {
            return Ok(TraderQueryOutcome::Empty(EmptyGraph::no_transfers(chain)));
        }
        let top = preliminary.top_addresses(self.builder.top_traders());

        let enrichment = self.enrich_in_slices(&mut transfers, &top, chain).await;
        let timestamped = transfers.iter().filter(|t| t.timestamp.is_some()).count();
        context
            .clone()
            .with_count("timestamped", timestamped)
            .with_count("recovered", enrichment.recovered)
            .info(&format!(
                "Timestamped {} of {} transfers",
                timestamped,
                transfers.len()
            ));

        let aggregation = self.aggregator.fold(&transfers);
        let graph = self.builder.build(
            &aggregation,
            chain,
            BuildInputs {
                total_transfers: transfers.len(),
                timestamped,
            },
        );

        MetricsLogger::log_graph_built(
            chain.key(),
            address,
            graph.nodes.len(),
            graph.links.len(),
            monitor.elapsed_ms(),
        );
        monitor.finish();

        self.result_cache.store(key, graph.clone());
        Ok(TraderQueryOutcome::Graph(graph))
    }

    pub fn memory_report(&self) -> MemoryReport {
        let blocks = self.block_cache.stats();
        let requests = self.result_cache.stats();
        MemoryReport {
            cache_stats: CacheReport {
                block_timestamp_cache_size: blocks.entries,
                request_cache_size: requests.entries,
                block_timestamp_hits: blocks.hits,
                block_timestamp_misses: blocks.misses,
                request_hits: requests.hits,
                request_misses: requests.misses,
            },
        }
    }

    /// Rejects tokens with no transfers at all
    async fn check_activity(&self, address: &str, chain: Chain) -> Result<()> {
        let activity_filter = TransferFilter::for_contract(address, 1);
        let page = self
            .transfer_throttle
            .run("alchemy_getAssetTransfers", self.port.get_asset_transfers(chain, &activity_filter))
            .await?;

        if page.transfers.is_empty() {
            return Err(GraphError::NoUpstreamActivity {
                chain: chain.key().to_string(),
            });
        }
        Ok(())
    }

    /// Enriches slice by slice, transfers between top traders first
    async fn enrich_in_slices(
        &self,
        transfers: &mut [TransferRecord],
        top: &HashSet<String>,
        chain: Chain,
    ) -> EnrichmentReport {
        let mut budget = RecoveryBudget::new(self.pipeline.max_recovery_per_request);
        let mut total = EnrichmentReport::default();
        let slice_size = self.pipeline.enrichment_slice_size.max(1);
        let slice_count = transfers.len().div_ceil(slice_size);

        for (index, slice) in transfers.chunks_mut(slice_size).enumerate() {
            let mut relevant: Vec<&mut TransferRecord> = slice
                .iter_mut()
                .filter(|t| {
                    t.endpoints()
                        .is_some_and(|(from, to)| top.contains(from) && top.contains(to))
                })
                .collect();
            if !relevant.is_empty() {
                total.merge(self.enricher.enrich(&mut relevant, chain, &mut budget).await);
            }

            let mut remaining: Vec<&mut TransferRecord> =
                slice.iter_mut().filter(|t| t.timestamp.is_none()).collect();
            if !remaining.is_empty() {
                total.merge(self.enricher.enrich(&mut remaining, chain, &mut budget).await);
            }

            if index + 1 < slice_count {
                pause(self.pipeline.enrichment_slice_delay_ms).await;
            }
        }

        total
    }
}
