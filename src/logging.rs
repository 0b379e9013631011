use log::{info, warn, error, debug, trace};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, GraphError};

/// Structured logging context
#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_chain(self, chain: &str) -> Self {
        self.with_metadata("chain", json!(chain))
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_count(self, key: &str, count: usize) -> Self {
        self.with_metadata(key, json!(count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times an operation and logs its outcome when finished
pub struct PerformanceMonitor {
    start: Instant,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn context(self, duration: u64) -> LogContext {
        let mut context = LogContext::new("performance", &self.operation)
            .with_duration_ms(duration);
        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }
        context
    }

    pub fn finish(self) -> u64 {
        let duration = self.elapsed_ms();
        self.context(duration)
            .debug(&format!("Operation completed in {}ms", duration));
        duration
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();
        let context = self.context(duration);

        match result {
            Ok(_) => {
                context.debug(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context
                    .with_metadata("error", json!(e.to_string()))
                    .warn(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &GraphError, context: Option<LogContext>) {
        let severity = error.severity();

        let log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("client_error", json!(error.is_client_error()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }
}

/// Pipeline metrics emitted as structured log lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_upstream_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "upstream_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.trace(&format!("Upstream call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("Upstream call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_block_search(chain: &str, block_number: u64, iterations: u32, exact: bool) {
        LogContext::new("metrics", "block_search")
            .with_chain(chain)
            .with_block_number(block_number)
            .with_metadata("iterations", json!(iterations))
            .with_metadata("exact", json!(exact))
            .info(&format!("Resolved block {} after {} lookups", block_number, iterations));
    }

    pub fn log_fetch_group(chain: &str, group: u32, requests: usize, total_records: usize) {
        LogContext::new("metrics", "fetch_group")
            .with_chain(chain)
            .with_metadata("group", json!(group))
            .with_count("requests", requests)
            .with_count("total_records", total_records)
            .debug(&format!("Group {} done, {} records so far", group, total_records));
    }

    pub fn log_enrichment(chain: &str, blocks_cached: usize, blocks_fetched: usize, recovered: usize) {
        LogContext::new("metrics", "enrichment")
            .with_chain(chain)
            .with_count("blocks_cached", blocks_cached)
            .with_count("blocks_fetched", blocks_fetched)
            .with_count("recovered", recovered)
            .debug(&format!(
                "Enriched from {} cached and {} fetched blocks, {} recovered by hash",
                blocks_cached, blocks_fetched, recovered
            ));
    }

    pub fn log_cache_event(cache: &str, key: &str, hit: bool) {
        let context = LogContext::new("metrics", "cache")
            .with_metadata("cache", json!(cache))
            .with_metadata("key", json!(key))
            .with_metadata("hit", json!(hit));

        if hit {
            context.info(&format!("Serving cached data for {}", key));
        } else {
            context.debug(&format!("Cache miss for {}", key));
        }
    }

    pub fn log_graph_built(chain: &str, address: &str, nodes: usize, links: usize, duration_ms: u64) {
        LogContext::new("metrics", "graph_built")
            .with_chain(chain)
            .with_address(address)
            .with_count("nodes", nodes)
            .with_count("links", links)
            .with_duration_ms(duration_ms)
            .info(&format!("Processed: {} traders, {} links", nodes, links));
    }
}

/// Initialize structured logging for the application
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pretty = config.format == "pretty";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format(move |buf, record| {
            use std::io::Write;

            let args = record.args().to_string();
            match serde_json::from_str::<Value>(&args) {
                Ok(json_value) if pretty => writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?),
                Ok(json_value) => writeln!(buf, "{}", json_value),
                Err(_) => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    args
                ),
            }
        })
        .try_init()?;

    info!("Structured logging initialized");
    Ok(())
}
