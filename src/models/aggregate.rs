use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::TransferRecord;

pub const DEFAULT_MAX_TRANSACTIONS_PER_TRADER: usize = 50;

/// Entry in a trader's transaction history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionSummary {
    pub hash: String,
    pub timestamp: Option<String>,
    pub value: f64,
}

/// Net flow and capped history for one address
#[derive(Debug, Clone, PartialEq)]
pub struct TraderAggregate {
    pub address: String,
    /// Received minus sent
    pub volume: f64,
    pub transactions: Vec<TransactionSummary>,
}

/// Latest transfer seen between an ordered pair of addresses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkRecord {
    pub source: String,
    pub target: String,
    pub timestamp: Option<String>,
    pub hash: String,
    pub value: f64,
}

/// Links keyed by (source, target). Writing an existing pair replaces the
/// record but keeps the pair's original position.
#[derive(Debug, Clone, Default)]
pub struct LinkMap {
    index: HashMap<(String, String), usize>,
    links: Vec<LinkRecord>,
}

impl LinkMap {
    pub fn upsert(&mut self, link: LinkRecord) {
        let key = (link.source.clone(), link.target.clone());
        match self.index.get(&key) {
            Some(&position) => self.links[position] = link,
            None => {
                self.index.insert(key, self.links.len());
                self.links.push(link);
            }
        }
    }

    pub fn get(&self, source: &str, target: &str) -> Option<&LinkRecord> {
        self.index
            .get(&(source.to_string(), target.to_string()))
            .map(|&position| &self.links[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Result of folding a transfer set
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    traders: Vec<TraderAggregate>,
    index: HashMap<String, usize>,
    pub links: LinkMap,
    counted_transfers: usize,
}

impl Aggregation {
    /// Traders in the order their address was first seen
    pub fn traders(&self) -> &[TraderAggregate] {
        &self.traders
    }

    pub fn trader(&self, address: &str) -> Option<&TraderAggregate> {
        self.index.get(address).map(|&i| &self.traders[i])
    }

    pub fn len(&self) -> usize {
        self.traders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traders.is_empty()
    }

    /// Transfers that passed the value and endpoint checks
    pub fn counted_transfers(&self) -> usize {
        self.counted_transfers
    }

    /// Top `limit` traders by absolute volume, ties kept in first-seen order
    pub fn ranked(&self, limit: usize) -> Vec<&TraderAggregate> {
        let mut ranked: Vec<&TraderAggregate> = self.traders.iter().collect();
        ranked.sort_by(|a, b| b.volume.abs().total_cmp(&a.volume.abs()));
        ranked.truncate(limit);
        ranked
    }

    pub fn top_addresses(&self, limit: usize) -> HashSet<String> {
        self.ranked(limit)
            .into_iter()
            .map(|t| t.address.clone())
            .collect()
    }

    fn entry(&mut self, address: &str) -> &mut TraderAggregate {
        let position = match self.index.get(address) {
            Some(&position) => position,
            None => {
                self.index.insert(address.to_string(), self.traders.len());
                self.traders.push(TraderAggregate {
                    address: address.to_string(),
                    volume: 0.0,
                    transactions: Vec::new(),
                });
                self.traders.len() - 1
            }
        };
        &mut self.traders[position]
    }
}

/// Folds transfers into per-address net flow and a pairwise link map
#[derive(Debug, Clone)]
pub struct TraderAggregator {
    max_transactions_per_trader: usize,
}

impl Default for TraderAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRANSACTIONS_PER_TRADER)
    }
}

impl TraderAggregator {
    pub fn new(max_transactions_per_trader: usize) -> Self {
        Self { max_transactions_per_trader }
    }

    pub fn fold(&self, transfers: &[TransferRecord]) -> Aggregation {
        let mut aggregation = Aggregation::default();

        for transfer in transfers {
            let value = transfer.amount();
            if !value.is_finite() || value <= 0.0 {
                continue;
            }
            let Some((from, to)) = transfer.endpoints() else {
                continue;
            };

            let summary = TransactionSummary {
                hash: transfer.hash.clone(),
                timestamp: transfer.timestamp.clone(),
                value,
            };

            self.apply(aggregation.entry(from), -value, &summary);
            self.apply(aggregation.entry(to), value, &summary);

            aggregation.links.upsert(LinkRecord {
                source: from.to_string(),
                target: to.to_string(),
                timestamp: transfer.timestamp.clone(),
                hash: transfer.hash.clone(),
                value,
            });
            aggregation.counted_transfers += 1;
        }

        aggregation
    }

    fn apply(&self, trader: &mut TraderAggregate, delta: f64, summary: &TransactionSummary) {
        trader.volume += delta;
        if trader.transactions.len() < self.max_transactions_per_trader {
            trader.transactions.push(summary.clone());
        }
    }
}
