use futures::future::join_all;
use std::sync::Arc;

use crate::blockchain::{BlockTag, Chain, ChainDataPort, TransferFilter};
use crate::config::PipelineConfig;
use crate::error::UpstreamError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::TransferRecord;
use crate::pipeline::{pause, BatchReport, DelayPolicy, Throttle};

/// Limit that stopped a fetch before the provider ran out of pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceiling {
    Records,
    Groups,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub transfers: Vec<TransferRecord>,
    pub report: BatchReport,
    pub ceiling: Option<Ceiling>,
    pub groups: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Concurrent page requests per group, and the number of lanes
    pub group_size: usize,
    pub max_groups: u32,
    pub max_records: usize,
    pub delay: DelayPolicy,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            group_size: 3,
            max_groups: 5,
            max_records: 3000,
            delay: DelayPolicy::default(),
        }
    }
}

impl FetchLimits {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            group_size: config.fetch_group_size.max(1),
            max_groups: config.max_fetch_groups,
            max_records: config.max_records,
            delay: DelayPolicy {
                base_ms: config.fetch_delay_base_ms,
                records_per_ms: config.fetch_delay_records_per_ms as u64,
                max_extra_ms: config.fetch_delay_max_extra_ms,
            },
        }
    }
}

/// A block sub-range paginated by its own page token
#[derive(Debug)]
struct Lane {
    from_block: BlockTag,
    to_block: BlockTag,
    page_key: Option<String>,
    pages: u32,
    done: bool,
    transfers: Vec<TransferRecord>,
}

impl Lane {
    fn new(from_block: BlockTag, to_block: BlockTag) -> Self {
        Self {
            from_block,
            to_block,
            page_key: None,
            pages: 0,
            done: false,
            transfers: Vec::new(),
        }
    }

    fn filter(&self, base: &TransferFilter) -> TransferFilter {
        base.clone()
            .with_range(self.from_block, self.to_block)
            .with_page_key(self.page_key.clone())
    }
}

/// Splits an inclusive block range into at most `count` contiguous lanes,
/// earlier lanes taking the remainder.
fn split_lanes(from_block: BlockTag, to_block: BlockTag, count: usize) -> Vec<Lane> {
    let (from, to) = match (from_block, to_block) {
        (BlockTag::Number(from), BlockTag::Number(to)) if to >= from => (from, to),
        _ => return vec![Lane::new(from_block, to_block)],
    };

    let span = to - from + 1;
    let count = (count.max(1) as u64).min(span);
    let base = span / count;
    let remainder = span % count;

    let mut lanes = Vec::with_capacity(count as usize);
    let mut start = from;
    for i in 0..count {
        let width = base + u64::from(i < remainder);
        let end = start + width - 1;
        lanes.push(Lane::new(BlockTag::Number(start), BlockTag::Number(end)));
        start = end + 1;
    }
    lanes
}

/// Paginated transfer retrieval in bounded concurrent groups
pub struct BatchFetcher {
    port: Arc<dyn ChainDataPort>,
    throttle: Throttle,
    limits: FetchLimits,
}

impl BatchFetcher {
    pub fn new(port: Arc<dyn ChainDataPort>, throttle: Throttle, limits: FetchLimits) -> Self {
        Self { port, throttle, limits }
    }

    pub fn limits(&self) -> &FetchLimits {
        &self.limits
    }

    /// Fetches every transfer matching `filter`, up to the group and record
    /// ceilings.
    ///
    /// Hitting a ceiling returns the partial set. Lanes advance in parallel,
    /// so that set holds the leading pages of each lane's block sub-range
    /// and may have gaps between them; it is not a continuous prefix of the
    /// full range.
    ///
    /// Failed page requests end their lane; the fetch only fails when every
    /// request failed and nothing was retrieved.
    pub async fn fetch_all(&self, filter: &TransferFilter, chain: Chain) -> Result<FetchOutcome, UpstreamError> {
        let monitor = PerformanceMonitor::new("fetch_all")
            .with_metadata("chain", serde_json::json!(chain.key()))
            .with_metadata("contract", serde_json::json!(filter.contract_address));
        let context = LogContext::new("batch_fetcher", "fetch_all")
            .with_chain(chain.key())
            .with_address(&filter.contract_address);

        let mut lanes = split_lanes(filter.from_block, filter.to_block, self.limits.group_size);
        let mut report = BatchReport::new("transfer_fetch");
        let mut last_error = None;
        let mut ceiling = None;
        let mut groups = 0u32;
        let mut total_records = 0usize;

        loop {
            let live: Vec<usize> = (0..lanes.len()).filter(|&i| !lanes[i].done).collect();
            if live.is_empty() {
                break;
            }
            if groups >= self.limits.max_groups {
                ceiling = Some(Ceiling::Groups);
                break;
            }
            groups += 1;

            let lane_filters: Vec<(usize, TransferFilter)> =
                live.iter().map(|&index| (index, lanes[index].filter(filter))).collect();
            let requests = lane_filters.into_iter().map(|(index, lane_filter)| {
                async move {
                    let result = self
                        .throttle
                        .run("alchemy_getAssetTransfers", self.port.get_asset_transfers(chain, &lane_filter))
                        .await;
                    (index, result)
                }
            });

            for (index, result) in join_all(requests).await {
                let lane = &mut lanes[index];
                let unit = format!("lane {} page {}", index, lane.pages);
                lane.pages += 1;

                match result {
                    Ok(page) => {
                        report.completed(unit);
                        total_records += page.transfers.len();
                        lane.transfers.extend(page.transfers);
                        lane.done = page.page_key.is_none();
                        lane.page_key = page.page_key;
                    }
                    Err(e) => {
                        let lane_context = context.clone().with_metadata("lane", serde_json::json!(index));
                        let message = format!("Page request failed, ending lane {}: {}", index, e);
                        if e.is_transient() {
                            lane_context.warn(&message);
                        } else {
                            lane_context.error(&message);
                        }
                        report.failed(unit, &e);
                        lane.done = true;
                        last_error = Some(e);
                    }
                }
            }

            MetricsLogger::log_fetch_group(chain.key(), groups, live.len(), total_records);

            if total_records >= self.limits.max_records {
                ceiling = Some(Ceiling::Records);
                break;
            }
            if lanes.iter().all(|lane| lane.done) {
                break;
            }
            pause(self.limits.delay.delay_ms(total_records)).await;
        }

        report.log_summary(context.clone().with_count("groups", groups as usize));

        if report.all_failed() && total_records == 0 {
            monitor.finish();
            return Err(last_error.unwrap_or_else(|| {
                UpstreamError::InvalidResponse("Every transfer page request failed".to_string())
            }));
        }

        let mut transfers: Vec<TransferRecord> = lanes.into_iter().flat_map(|lane| lane.transfers).collect();
        transfers.truncate(self.limits.max_records);

        if let Some(limit) = ceiling {
            context
                .with_count("records", transfers.len())
                .with_metadata("ceiling", serde_json::json!(format!("{:?}", limit)))
                .info(&format!("Stopped fetching at {:?} ceiling with {} records", limit, transfers.len()));
        }
        monitor.finish();

        Ok(FetchOutcome {
            transfers,
            report,
            ceiling,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(lanes: &[Lane]) -> Vec<(BlockTag, BlockTag)> {
        lanes.iter().map(|l| (l.from_block, l.to_block)).collect()
    }

    #[test]
    fn test_split_even_range() {
        let lanes = split_lanes(BlockTag::Number(0), BlockTag::Number(8), 3);
        assert_eq!(
            ranges(&lanes),
            vec![
                (BlockTag::Number(0), BlockTag::Number(2)),
                (BlockTag::Number(3), BlockTag::Number(5)),
                (BlockTag::Number(6), BlockTag::Number(8)),
            ]
        );
    }

    #[test]
    fn test_split_with_remainder() {
        let lanes = split_lanes(BlockTag::Number(100), BlockTag::Number(109), 3);
        assert_eq!(
            ranges(&lanes),
            vec![
                (BlockTag::Number(100), BlockTag::Number(103)),
                (BlockTag::Number(104), BlockTag::Number(106)),
                (BlockTag::Number(107), BlockTag::Number(109)),
            ]
        );
    }

    #[test]
    fn test_split_narrow_range() {
        let lanes = split_lanes(BlockTag::Number(5), BlockTag::Number(6), 3);
        assert_eq!(lanes.len(), 2);

        let single = split_lanes(BlockTag::Number(5), BlockTag::Number(5), 3);
        assert_eq!(ranges(&single), vec![(BlockTag::Number(5), BlockTag::Number(5))]);
    }

    #[test]
    fn test_open_range_is_one_lane() {
        let lanes = split_lanes(BlockTag::Number(0), BlockTag::Latest, 3);
        assert_eq!(ranges(&lanes), vec![(BlockTag::Number(0), BlockTag::Latest)]);
    }

    #[test]
    fn test_limits_from_config() {
        let limits = FetchLimits::from_config(&PipelineConfig::default());
        assert_eq!(limits.group_size, 3);
        assert_eq!(limits.max_groups, 5);
        assert_eq!(limits.max_records, 3000);
        assert_eq!(limits.delay, DelayPolicy::default());
    }
}
