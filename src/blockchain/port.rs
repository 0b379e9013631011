use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::blockchain::Chain;
use crate::error::UpstreamError;
use crate::models::TransferRecord;

/// Block reference accepted by the transfer filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

impl BlockTag {
    pub fn to_hex(&self) -> String {
        match self {
            BlockTag::Number(n) => format!("0x{:x}", n),
            BlockTag::Latest => "latest".to_string(),
        }
    }
}

impl Serialize for BlockTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Filter for a single page of token transfers
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFilter {
    pub contract_address: String,
    pub from_block: BlockTag,
    pub to_block: BlockTag,
    pub max_count: u32,
    pub page_key: Option<String>,
}

impl TransferFilter {
    /// Filter covering the whole history of a token contract
    pub fn for_contract(contract_address: &str, max_count: u32) -> Self {
        Self {
            contract_address: contract_address.to_string(),
            from_block: BlockTag::Number(0),
            to_block: BlockTag::Latest,
            max_count,
            page_key: None,
        }
    }

    pub fn with_range(mut self, from_block: BlockTag, to_block: BlockTag) -> Self {
        self.from_block = from_block;
        self.to_block = to_block;
        self
    }

    pub fn with_page_key(mut self, page_key: Option<String>) -> Self {
        self.page_key = page_key;
        self
    }
}

/// One page of transfers plus the token for the next page, if any
#[derive(Debug, Clone, Default)]
pub struct TransferPage {
    pub transfers: Vec<TransferRecord>,
    pub page_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    /// Unix seconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: String,
    /// None while the transaction is pending
    pub block_number: Option<u64>,
}

/// Capabilities the pipeline consumes from an upstream chain data provider
#[async_trait]
pub trait ChainDataPort: Send + Sync {
    async fn get_latest_block_number(&self, chain: Chain) -> Result<u64, UpstreamError>;

    async fn get_block(&self, chain: Chain, block_number: u64) -> Result<BlockInfo, UpstreamError>;

    async fn get_asset_transfers(
        &self,
        chain: Chain,
        filter: &TransferFilter,
    ) -> Result<TransferPage, UpstreamError>;

    async fn get_transaction_by_hash(
        &self,
        chain: Chain,
        hash: &str,
    ) -> Result<TransactionInfo, UpstreamError>;
}
