pub mod address;
pub mod aggregate;
pub mod graph;
pub mod transfer;
pub mod window;

pub use address::{normalize_address, validate_address};
pub use aggregate::{
    Aggregation, LinkMap, LinkRecord, TraderAggregate, TraderAggregator, TransactionSummary,
};
pub use graph::{
    whale_threshold, BuildInputs, EmptyGraph, GraphBuilder, GraphResult, GraphStats, TraderClass,
    TraderNode, TraderQueryOutcome,
};
pub use transfer::{scale_raw_amount, TransferRecord, RAW_AMOUNT_SCALE};
pub use window::TimeWindow;
