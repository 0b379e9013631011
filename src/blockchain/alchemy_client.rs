use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::blockchain::{BlockInfo, BlockTag, Chain, ChainDataPort, TransactionInfo, TransferFilter, TransferPage};
use crate::config::ProviderConfig;
use crate::error::UpstreamError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::TransferRecord;

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetTransferParams<'a> {
    from_block: BlockTag,
    to_block: BlockTag,
    contract_addresses: [&'a str; 1],
    category: [&'static str; 1],
    max_count: String,
    exclude_zero_value: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_key: Option<&'a str>,
}

impl<'a> AssetTransferParams<'a> {
    fn from_filter(filter: &'a TransferFilter) -> Self {
        Self {
            from_block: filter.from_block,
            to_block: filter.to_block,
            contract_addresses: [filter.contract_address.as_str()],
            category: ["erc20"],
            max_count: format!("0x{:x}", filter.max_count),
            exclude_zero_value: true,
            page_key: filter.page_key.as_deref().filter(|key| !key.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireTransferPage {
    #[serde(default)]
    transfers: Vec<WireTransfer>,
    #[serde(rename = "pageKey")]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTransfer {
    #[serde(rename = "blockNum")]
    block_num: Option<String>,
    hash: String,
    from: Option<String>,
    to: Option<String>,
    value: Option<f64>,
    #[serde(rename = "rawContract")]
    raw_contract: Option<WireRawContract>,
}

#[derive(Debug, Deserialize)]
struct WireRawContract {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    number: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct WireTransaction {
    hash: String,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

impl From<WireTransfer> for TransferRecord {
    fn from(wire: WireTransfer) -> Self {
        let block_number = wire.block_num.as_deref().and_then(|hex| parse_hex_to_u64(hex).ok());
        TransferRecord {
            hash: wire.hash,
            from: wire.from,
            to: wire.to,
            value: wire.value.filter(|v| v.is_finite()),
            raw_value: wire.raw_contract.and_then(|raw| raw.value),
            block_number,
            timestamp: None,
        }
    }
}

/// `ChainDataPort` backed by the Alchemy JSON-RPC API, one endpoint per chain
#[derive(Clone)]
pub struct AlchemyClient {
    client: Client,
    endpoint_template: String,
    api_key: String,
    timeout: Duration,
}

impl AlchemyClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, UpstreamError> {
        let context = LogContext::new("alchemy_client", "initialization")
            .with_metadata("endpoint_template", serde_json::json!(config.endpoint_template))
            .with_metadata("timeout_seconds", serde_json::json!(config.timeout_seconds));
        context.info("Initializing Alchemy client");

        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint_template: config.endpoint_template.clone(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    pub fn endpoint_for(&self, chain: Chain) -> String {
        self.endpoint_template
            .replace("{network}", chain.network_id())
            .replace("{api_key}", &self.api_key)
    }

    async fn make_request(&self, chain: Chain, method: &str, params: Vec<Value>) -> Result<Value, UpstreamError> {
        let context = LogContext::new("alchemy_client", "make_request")
            .with_chain(chain.key())
            .with_metadata("method", serde_json::json!(method));

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: 1,
        };

        context.trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(self.endpoint_for(chain))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout {
                        operation: method.to_string(),
                        millis: self.timeout.as_millis() as u64,
                    }
                } else if e.is_connect() {
                    UpstreamError::Connection(e.to_string())
                } else {
                    UpstreamError::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimit);
        }
        if !status.is_success() {
            return Err(UpstreamError::Connection(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let rpc_response: JsonRpcResponse = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(match error.code {
                // Alchemy reports throughput limits as a JSON-RPC error
                429 => UpstreamError::RateLimit,
                -32700 => UpstreamError::InvalidResponse("Parse error".to_string()),
                -32600 => UpstreamError::InvalidResponse("Invalid request".to_string()),
                code => UpstreamError::Method { code, message: error.message },
            });
        }

        rpc_response
            .result
            .ok_or_else(|| UpstreamError::InvalidResponse("No result in response".to_string()))
    }

    /// Runs a request and records its duration and outcome
    async fn timed_request(&self, chain: Chain, method: &str, params: Vec<Value>) -> Result<Value, UpstreamError> {
        let monitor = PerformanceMonitor::new(&format!("rpc_{}", method))
            .with_metadata("chain", serde_json::json!(chain.key()));
        let result = self.make_request(chain, method, params).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_upstream_call(method, duration, result.is_ok());
        result
    }
}

#[async_trait]
impl ChainDataPort for AlchemyClient {
    async fn get_latest_block_number(&self, chain: Chain) -> Result<u64, UpstreamError> {
        let result = self.timed_request(chain, "eth_blockNumber", vec![]).await?;

        let hex_string = result
            .as_str()
            .ok_or_else(|| UpstreamError::InvalidResponse("Block number is not a string".to_string()))?;
        let block_number = parse_hex_to_u64(hex_string)?;

        LogContext::new("alchemy_client", "get_latest_block_number")
            .with_chain(chain.key())
            .with_block_number(block_number)
            .debug(&format!("Retrieved latest block number: {}", block_number));

        Ok(block_number)
    }

    async fn get_block(&self, chain: Chain, block_number: u64) -> Result<BlockInfo, UpstreamError> {
        let params = vec![
            Value::String(BlockTag::Number(block_number).to_hex()),
            Value::Bool(false), // transaction hashes only
        ];

        let result = self.timed_request(chain, "eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return Err(UpstreamError::BlockNotFound { block_number });
        }

        let block: WireBlock = serde_json::from_value(result)?;
        let timestamp = parse_hex_to_u64(&block.timestamp)?;
        let timestamp = i64::try_from(timestamp).map_err(|_| {
            UpstreamError::InvalidResponse(format!("Block timestamp out of range: {}", block.timestamp))
        })?;

        Ok(BlockInfo {
            number: parse_hex_to_u64(&block.number)?,
            timestamp,
        })
    }

    async fn get_asset_transfers(&self, chain: Chain, filter: &TransferFilter) -> Result<TransferPage, UpstreamError> {
        let params = vec![serde_json::to_value(AssetTransferParams::from_filter(filter))?];

        let result = self.timed_request(chain, "alchemy_getAssetTransfers", params).await?;
        let page: WireTransferPage = serde_json::from_value(result)?;

        let transfers: Vec<TransferRecord> = page.transfers.into_iter().map(TransferRecord::from).collect();

        LogContext::new("alchemy_client", "get_asset_transfers")
            .with_chain(chain.key())
            .with_address(&filter.contract_address)
            .with_count("transfer_count", transfers.len())
            .with_metadata("has_next_page", serde_json::json!(page.page_key.is_some()))
            .debug(&format!("Retrieved {} transfers", transfers.len()));

        Ok(TransferPage {
            transfers,
            page_key: page.page_key.filter(|key| !key.is_empty()),
        })
    }

    async fn get_transaction_by_hash(&self, chain: Chain, hash: &str) -> Result<TransactionInfo, UpstreamError> {
        let params = vec![Value::String(hash.to_string())];

        let result = self.timed_request(chain, "eth_getTransactionByHash", params).await?;
        if result.is_null() {
            return Err(UpstreamError::TransactionNotFound { hash: hash.to_string() });
        }

        let tx: WireTransaction = serde_json::from_value(result)?;
        let block_number = tx.block_number.as_deref().map(parse_hex_to_u64).transpose()?;

        Ok(TransactionInfo { hash: tx.hash, block_number })
    }
}

pub fn parse_hex_to_u64(hex_str: &str) -> Result<u64, UpstreamError> {
    let hex_without_prefix = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    u64::from_str_radix(hex_without_prefix, 16)
        .map_err(|e| UpstreamError::InvalidResponse(format!("Failed to parse hex '{}' to u64: {}", hex_str, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            api_key: "test-key".to_string(),
            endpoint_template: "https://{network}.g.alchemy.com/v2/{api_key}".to_string(),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_endpoint_for_chain() {
        let client = AlchemyClient::new(&test_config()).unwrap();
        assert_eq!(client.endpoint_for(Chain::Eth), "https://eth-mainnet.g.alchemy.com/v2/test-key");
        assert_eq!(client.endpoint_for(Chain::Arbi), "https://arb-mainnet.g.alchemy.com/v2/test-key");
    }

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_blockNumber".to_string(),
            params: vec![],
            id: 1,
        };

        let serialized = serde_json::to_string(&request).unwrap();
        let expected = r#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}"#;
        assert_eq!(serialized, expected);
    }

    #[test]
    fn test_json_rpc_error_deserialization() {
        let response_json = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#;
        let response: JsonRpcResponse = serde_json::from_str(response_json).unwrap();

        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn test_asset_transfer_params() {
        let filter = TransferFilter::for_contract("0xabc", 1000)
            .with_range(BlockTag::Number(255), BlockTag::Latest)
            .with_page_key(Some("page-2".to_string()));

        let json = serde_json::to_value(AssetTransferParams::from_filter(&filter)).unwrap();

        assert_eq!(json["fromBlock"], "0xff");
        assert_eq!(json["toBlock"], "latest");
        assert_eq!(json["contractAddresses"], json!(["0xabc"]));
        assert_eq!(json["category"], json!(["erc20"]));
        assert_eq!(json["maxCount"], "0x3e8");
        assert_eq!(json["pageKey"], "page-2");

        let first_page = TransferFilter::for_contract("0xabc", 1);
        let json = serde_json::to_value(AssetTransferParams::from_filter(&first_page)).unwrap();
        assert!(json.get("pageKey").is_none());
    }

    #[test]
    fn test_wire_transfer_normalization() {
        let page: WireTransferPage = serde_json::from_value(json!({
            "transfers": [
                {
                    "blockNum": "0x10",
                    "hash": "0xaaa",
                    "from": "0x1",
                    "to": "0x2",
                    "value": 12.5,
                    "rawContract": { "value": "0xad78ebc5ac6200000", "decimal": "0x12" }
                },
                {
                    "blockNum": "0x11",
                    "hash": "0xbbb",
                    "from": "0x2",
                    "to": null,
                    "value": null,
                    "rawContract": { "value": "0xde0b6b3a7640000" }
                }
            ],
            "pageKey": "next"
        }))
        .unwrap();

        let records: Vec<TransferRecord> = page.transfers.into_iter().map(TransferRecord::from).collect();

        assert_eq!(records[0].block_number, Some(16));
        assert_eq!(records[0].value, Some(12.5));
        assert_eq!(records[1].to, None);
        assert_eq!(records[1].value, None);
        assert_eq!(records[1].amount(), 1.0);
        assert!(records.iter().all(|r| r.timestamp.is_none()));
        assert_eq!(page.page_key.as_deref(), Some("next"));
    }

    #[test]
    fn test_parse_hex_to_u64() {
        assert_eq!(parse_hex_to_u64("0x1234").unwrap(), 0x1234u64);
        assert_eq!(parse_hex_to_u64("1234").unwrap(), 0x1234u64);
        assert_eq!(parse_hex_to_u64("0x0").unwrap(), 0u64);
        assert!(parse_hex_to_u64("invalid").is_err());
    }
}
