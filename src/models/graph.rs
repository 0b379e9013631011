use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::blockchain::Chain;
use crate::models::aggregate::{Aggregation, LinkRecord, TransactionSummary};

pub const DEFAULT_TOP_TRADERS: usize = 100;

/// Fraction of the ranked list above which traders count as whales
const WHALE_RANK_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraderClass {
    Whale,
    Retail,
}

impl TraderClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraderClass::Whale => "whale",
            TraderClass::Retail => "retail",
        }
    }
}

impl fmt::Display for TraderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderNode {
    pub id: String,
    pub volume: f64,
    #[serde(rename = "type")]
    pub class: TraderClass,
    pub transactions: Vec<TransactionSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_transfers: usize,
    pub timestamped: usize,
    pub total_traders: usize,
    pub top_traders: usize,
    pub total_links: usize,
    pub timestamped_links: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphResult {
    pub nodes: Vec<TraderNode>,
    pub links: Vec<LinkRecord>,
    pub chain: Chain,
    pub stats: GraphStats,
}

impl GraphResult {
    pub fn whales(&self) -> impl Iterator<Item = &TraderNode> {
        self.nodes.iter().filter(|n| n.class == TraderClass::Whale)
    }
}

/// Response body when the window holds nothing to graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyGraph {
    pub nodes: Vec<TraderNode>,
    pub links: Vec<LinkRecord>,
    pub message: String,
}

impl EmptyGraph {
    pub fn no_transfers(chain: Chain) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            message: format!(
                "No valid transfers found for this token on {} in the selected time period.",
                chain
            ),
        }
    }
}

/// Outcome of a trader query, serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraderQueryOutcome {
    Graph(GraphResult),
    Empty(EmptyGraph),
}

impl TraderQueryOutcome {
    pub fn graph(&self) -> Option<&GraphResult> {
        match self {
            TraderQueryOutcome::Graph(graph) => Some(graph),
            TraderQueryOutcome::Empty(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TraderQueryOutcome::Empty(_))
    }
}

/// Counters gathered before the graph is built
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildInputs {
    /// Transfers returned by the fetcher
    pub total_transfers: usize,
    /// Transfers that ended up with a timestamp
    pub timestamped: usize,
}

/// Volume a trader needs to count as a whale.
///
/// `ranked` must already be sorted by absolute volume, descending.
pub fn whale_threshold(ranked: &[f64]) -> f64 {
    match ranked.len() {
        0 => 0.0,
        n if n >= 4 => {
            let index = (n as f64 * WHALE_RANK_FRACTION).floor() as usize;
            ranked[index].abs()
        }
        _ => ranked[0].abs() / 2.0,
    }
}

#[derive(Debug, Clone)]
pub struct GraphBuilder {
    top_traders: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_TRADERS)
    }
}

impl GraphBuilder {
    pub fn new(top_traders: usize) -> Self {
        Self { top_traders }
    }

    pub fn top_traders(&self) -> usize {
        self.top_traders
    }

    pub fn build(&self, aggregation: &Aggregation, chain: Chain, inputs: BuildInputs) -> GraphResult {
        let ranked = aggregation.ranked(self.top_traders);
        let volumes: Vec<f64> = ranked.iter().map(|t| t.volume).collect();
        let threshold = whale_threshold(&volumes);

        let nodes: Vec<TraderNode> = ranked
            .into_iter()
            .map(|trader| TraderNode {
                id: trader.address.clone(),
                volume: trader.volume,
                class: if trader.volume.abs() >= threshold {
                    TraderClass::Whale
                } else {
                    TraderClass::Retail
                },
                transactions: trader.transactions.clone(),
            })
            .collect();

        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let links: Vec<LinkRecord> = aggregation
            .links
            .iter()
            .filter(|l| ids.contains(l.source.as_str()) && ids.contains(l.target.as_str()))
            .cloned()
            .collect();

        let stats = GraphStats {
            total_transfers: inputs.total_transfers,
            timestamped: inputs.timestamped,
            total_traders: aggregation.len(),
            top_traders: nodes.len(),
            total_links: links.len(),
            timestamped_links: links.iter().filter(|l| l.timestamp.is_some()).count(),
        };

        GraphResult { nodes, links, chain, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TraderAggregator, TransferRecord};

    fn fold(transfers: &[(&str, &str, f64)]) -> Aggregation {
        let records: Vec<TransferRecord> = transfers
            .iter()
            .enumerate()
            .map(|(i, (from, to, value))| TransferRecord::new(&format!("0x{:x}", i), from, to, *value))
            .collect();
        TraderAggregator::default().fold(&records)
    }

    #[test]
    fn test_threshold_small_sets() {
        assert_eq!(whale_threshold(&[]), 0.0);
        assert_eq!(whale_threshold(&[-80.0]), 40.0);
        assert_eq!(whale_threshold(&[100.0, -60.0, 10.0]), 50.0);
    }

    #[test]
    fn test_threshold_quartile() {
        // floor(4 * 0.25) = 1
        assert_eq!(whale_threshold(&[100.0, -60.0, 30.0, 10.0]), 60.0);
        // floor(9 * 0.25) = 2
        let volumes = [90.0, 80.0, -70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 10.0];
        assert_eq!(whale_threshold(&volumes), 70.0);
    }

    #[test]
    fn test_classification_follows_rank() {
        let aggregation = fold(&[
            ("A", "B", 100.0),
            ("C", "D", 60.0),
            ("E", "F", 30.0),
            ("G", "H", 10.0),
        ]);

        let graph = GraphBuilder::default().build(&aggregation, Chain::Eth, BuildInputs::default());

        // ranked: A, B, C, D, E, F, G, H; threshold = |volume| at index 2 = 60
        let classes: Vec<TraderClass> = graph.nodes.iter().map(|n| n.class).collect();
        let first_retail = classes
            .iter()
            .position(|c| *c == TraderClass::Retail)
            .unwrap();
        assert_eq!(first_retail, 4);
        assert!(classes[first_retail..].iter().all(|c| *c == TraderClass::Retail));
        assert_eq!(graph.whales().count(), 4);
    }

    #[test]
    fn test_top_n_and_link_filtering() {
        let aggregation = fold(&[
            ("A", "B", 100.0),
            ("B", "C", 50.0),
            ("C", "D", 1.0),
        ]);

        let graph = GraphBuilder::new(3).build(
            &aggregation,
            Chain::Base,
            BuildInputs { total_transfers: 3, timestamped: 0 },
        );

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        // A = -100, B = 50, C = 49, D = 1
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(graph.links.len(), 2);
        assert!(graph.links.iter().all(|l| l.target != "D"));
        assert_eq!(graph.stats.total_traders, 4);
        assert_eq!(graph.stats.top_traders, 3);
        assert_eq!(graph.stats.total_links, 2);
        assert_eq!(graph.stats.timestamped_links, 0);
        assert_eq!(graph.chain, Chain::Base);
    }

    #[test]
    fn test_json_shape() {
        let mut record = TransferRecord::new("0xabc", "A", "B", 2.0);
        record.timestamp = Some("2024-03-01T12:00:00.000Z".to_string());
        let aggregation = TraderAggregator::default().fold(&[record]);
        let graph = GraphBuilder::default().build(
            &aggregation,
            Chain::Eth,
            BuildInputs { total_transfers: 1, timestamped: 1 },
        );

        let json = serde_json::to_value(TraderQueryOutcome::Graph(graph)).unwrap();

        assert_eq!(json["chain"], "eth");
        assert_eq!(json["nodes"][0]["id"], "A");
        assert_eq!(json["nodes"][0]["type"], "whale");
        assert_eq!(json["nodes"][0]["transactions"][0]["hash"], "0xabc");
        assert_eq!(json["links"][0]["source"], "A");
        assert_eq!(json["links"][0]["timestamp"], "2024-03-01T12:00:00.000Z");
        assert_eq!(json["stats"]["totalTransfers"], 1);
        assert_eq!(json["stats"]["timestampedLinks"], 1);
    }

    #[test]
    fn test_empty_outcome_shape() {
        let json = serde_json::to_value(TraderQueryOutcome::Empty(EmptyGraph::no_transfers(Chain::Bnb))).unwrap();

        assert_eq!(json["nodes"].as_array().unwrap().len(), 0);
        assert_eq!(json["links"].as_array().unwrap().len(), 0);
        assert_eq!(
            json["message"],
            "No valid transfers found for this token on bnb in the selected time period."
        );
        assert!(json.get("stats").is_none());
    }
}
