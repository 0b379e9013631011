use serde::{Deserialize, Serialize};

/// Raw token amounts are fixed-point integers with 18 decimals
pub const RAW_AMOUNT_SCALE: f64 = 1e18;

/// A single token movement as returned by the upstream provider.
///
/// Only `block_number` and `timestamp` are written after ingestion, by the
/// timestamp enricher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferRecord {
    pub hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Decimal amount when the provider could compute one
    pub value: Option<f64>,
    /// Hex encoded raw amount, used when `value` is absent
    pub raw_value: Option<String>,
    pub block_number: Option<u64>,
    /// ISO-8601 block time
    pub timestamp: Option<String>,
}

impl TransferRecord {
    pub fn new(hash: &str, from: &str, to: &str, value: f64) -> Self {
        Self {
            hash: hash.to_string(),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            value: Some(value),
            raw_value: None,
            block_number: None,
            timestamp: None,
        }
    }

    pub fn with_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    /// Decimal amount of the transfer, 0.0 when none can be derived
    pub fn amount(&self) -> f64 {
        match (self.value, &self.raw_value) {
            (Some(value), _) => value,
            (None, Some(raw)) => scale_raw_amount(raw).unwrap_or(0.0),
            (None, None) => 0.0,
        }
    }

    /// Both endpoints, if present and non-empty
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        match (self.from.as_deref(), self.to.as_deref()) {
            (Some(from), Some(to)) if !from.is_empty() && !to.is_empty() => Some((from, to)),
            _ => None,
        }
    }
}

/// Interpret a hex string as an integer amount scaled down by 10^18.
///
/// Accumulates in floating point so amounts wider than 128 bits still parse.
pub fn scale_raw_amount(raw: &str) -> Option<f64> {
    let digits = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return None;
    }

    let mut acc = 0.0f64;
    for c in digits.chars() {
        acc = acc * 16.0 + c.to_digit(16)? as f64;
    }
    Some(acc / RAW_AMOUNT_SCALE)
}
