#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trader_graph::blockchain::{BlockInfo, BlockTag, Chain, ChainDataPort, TransactionInfo, TransferFilter, TransferPage};
use trader_graph::cache::{BlockTimestampCache, ManualClock, ResultCache};
use trader_graph::config::PipelineConfig;
use trader_graph::error::UpstreamError;
use trader_graph::models::TransferRecord;
use trader_graph::pipeline::TraderGraphService;

pub const TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
pub const GENESIS_TIME: i64 = 1_600_000_000;
pub const BLOCK_SECONDS: i64 = 12;

/// Unix time the stub assigns to a block
pub fn block_time(block_number: u64) -> i64 {
    GENESIS_TIME + block_number as i64 * BLOCK_SECONDS
}

/// In-memory `ChainDataPort` that counts every call it receives
pub struct StubChainData {
    pub latest_block: u64,
    transfers: Vec<TransferRecord>,
    transactions: HashMap<String, Option<u64>>,
    failing_blocks: HashSet<u64>,
    fail_latest: bool,
    fail_transfer_pages: bool,
    endless_pages: bool,
    pub latest_calls: AtomicUsize,
    pub block_calls: AtomicUsize,
    pub transfer_calls: AtomicUsize,
    pub transaction_calls: AtomicUsize,
    pub inspected_blocks: Mutex<Vec<u64>>,
    pub transfer_filters: Mutex<Vec<TransferFilter>>,
}

impl StubChainData {
    pub fn new(latest_block: u64) -> Self {
        Self {
            latest_block,
            transfers: Vec::new(),
            transactions: HashMap::new(),
            failing_blocks: HashSet::new(),
            fail_latest: false,
            fail_transfer_pages: false,
            endless_pages: false,
            latest_calls: AtomicUsize::new(0),
            block_calls: AtomicUsize::new(0),
            transfer_calls: AtomicUsize::new(0),
            transaction_calls: AtomicUsize::new(0),
            inspected_blocks: Mutex::new(Vec::new()),
            transfer_filters: Mutex::new(Vec::new()),
        }
    }

    pub fn with_transfers(mut self, transfers: Vec<TransferRecord>) -> Self {
        for transfer in &transfers {
            self.transactions.insert(transfer.hash.clone(), transfer.block_number);
        }
        self.transfers = transfers;
        self
    }

    /// Registers a transaction lookup result without adding a transfer
    pub fn with_transaction(mut self, hash: &str, block_number: Option<u64>) -> Self {
        self.transactions.insert(hash.to_string(), block_number);
        self
    }

    pub fn with_failing_blocks(mut self, blocks: impl IntoIterator<Item = u64>) -> Self {
        self.failing_blocks.extend(blocks);
        self
    }

    pub fn failing_latest(mut self) -> Self {
        self.fail_latest = true;
        self
    }

    /// Page requests fail, except single-record activity checks
    pub fn failing_transfer_pages(mut self) -> Self {
        self.fail_transfer_pages = true;
        self
    }

    /// Every page is full and always points at another page
    pub fn endless_pages(mut self) -> Self {
        self.endless_pages = true;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
            + self.block_calls.load(Ordering::SeqCst)
            + self.transfer_calls.load(Ordering::SeqCst)
            + self.transaction_calls.load(Ordering::SeqCst)
    }

    fn resolve(&self, tag: BlockTag) -> u64 {
        match tag {
            BlockTag::Number(n) => n,
            BlockTag::Latest => self.latest_block,
        }
    }
}

#[async_trait]
impl ChainDataPort for StubChainData {
    async fn get_latest_block_number(&self, _chain: Chain) -> Result<u64, UpstreamError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_latest {
            return Err(UpstreamError::Connection("head unavailable".to_string()));
        }
        Ok(self.latest_block)
    }

    async fn get_block(&self, _chain: Chain, block_number: u64) -> Result<BlockInfo, UpstreamError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        self.inspected_blocks.lock().push(block_number);
        if self.failing_blocks.contains(&block_number) || block_number > self.latest_block {
            return Err(UpstreamError::BlockNotFound { block_number });
        }
        Ok(BlockInfo {
            number: block_number,
            timestamp: block_time(block_number),
        })
    }

    async fn get_asset_transfers(&self, _chain: Chain, filter: &TransferFilter) -> Result<TransferPage, UpstreamError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.transfer_filters.lock().push(filter.clone());

        if self.fail_transfer_pages && filter.max_count > 1 {
            return Err(UpstreamError::RateLimit);
        }

        let page_size = filter.max_count as usize;
        let offset: usize = filter
            .page_key
            .as_deref()
            .and_then(|key| key.parse().ok())
            .unwrap_or(0);

        if self.endless_pages {
            let from = self.resolve(filter.from_block);
            let transfers = (0..page_size)
                .map(|i| {
                    TransferRecord::new(
                        &format!("0xendless-{}-{}", from, offset + i),
                        &format!("0xa{}", i % 7),
                        &format!("0xb{}", i % 5),
                        1.0,
                    )
                    .with_block(from)
                })
                .collect();
            return Ok(TransferPage {
                transfers,
                page_key: Some((offset + page_size).to_string()),
            });
        }

        let from = self.resolve(filter.from_block);
        let to = self.resolve(filter.to_block);
        let matching: Vec<&TransferRecord> = self
            .transfers
            .iter()
            // transfers without a block only show up in ranges starting at genesis
            .filter(|t| t.block_number.map_or(from == 0, |n| n >= from && n <= to))
            .collect();

        let page: Vec<TransferRecord> = matching.iter().skip(offset).take(page_size).map(|t| (*t).clone()).collect();
        let next = offset + page.len();
        let page_key = if next < matching.len() { Some(next.to_string()) } else { None };

        Ok(TransferPage { transfers: page, page_key })
    }

    async fn get_transaction_by_hash(&self, _chain: Chain, hash: &str) -> Result<TransactionInfo, UpstreamError> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        match self.transactions.get(hash) {
            Some(block_number) => Ok(TransactionInfo {
                hash: hash.to_string(),
                block_number: *block_number,
            }),
            None => Err(UpstreamError::TransactionNotFound { hash: hash.to_string() }),
        }
    }
}

pub fn transfer(hash: &str, from: &str, to: &str, value: f64, block: u64) -> TransferRecord {
    TransferRecord::new(hash, from, to, value).with_block(block)
}

/// Pipeline settings without pauses, so tests run fast
pub fn test_pipeline() -> PipelineConfig {
    PipelineConfig::default().without_delays()
}

pub struct TestHarness {
    pub port: Arc<StubChainData>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<TraderGraphService>,
}

/// Service over `port` with a manual clock set `now_block` blocks after genesis
pub fn harness(port: StubChainData, pipeline: PipelineConfig, now_block: u64) -> TestHarness {
    let port = Arc::new(port);
    let clock = Arc::new(ManualClock::new(block_time(now_block)));
    let block_cache = Arc::new(BlockTimestampCache::new(
        std::time::Duration::from_secs(86_400),
        std::time::Duration::from_secs(600),
        clock.clone(),
    ));
    let result_cache = Arc::new(ResultCache::new(
        std::time::Duration::from_secs(900),
        std::time::Duration::from_secs(600),
        clock.clone(),
    ));
    let service = Arc::new(TraderGraphService::with_caches(
        port.clone(),
        &pipeline,
        block_cache,
        result_cache,
        clock.clone(),
    ));

    TestHarness { port, clock, service }
}
