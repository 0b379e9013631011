use thiserror::Error;

/// Main error type for the trader graph service
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("No recent activity for this token on {chain}")]
    NoUpstreamActivity { chain: String },

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(String),
}

/// Errors raised while talking to the upstream chain data provider
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Deadline of {millis}ms exceeded for {operation}")]
    Timeout { operation: String, millis: u64 },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },

    #[error("Transaction not found: {hash}")]
    TransactionNotFound { hash: String },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Request validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("Invalid chain parameter: {chain}")]
    UnsupportedChain { chain: String, supported: Vec<String> },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that stop the service from doing useful work
    Critical,
    /// Errors that fail a request
    High,
    /// Errors that degrade a request but are recovered locally
    Medium,
    /// Caller mistakes, mostly informational
    Low,
}

impl GraphError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GraphError::Config(_) => ErrorSeverity::Critical,
            GraphError::Server(_) => ErrorSeverity::Critical,

            GraphError::Upstream(UpstreamError::Connection(_)) => ErrorSeverity::High,
            GraphError::Upstream(UpstreamError::Http(_)) => ErrorSeverity::High,
            GraphError::Upstream(UpstreamError::Method { .. }) => ErrorSeverity::High,

            GraphError::Upstream(UpstreamError::Timeout { .. }) => ErrorSeverity::Medium,
            GraphError::Upstream(UpstreamError::RateLimit) => ErrorSeverity::Medium,
            GraphError::Upstream(_) => ErrorSeverity::Medium,

            GraphError::InvalidInput(_) => ErrorSeverity::Low,
            GraphError::NoUpstreamActivity { .. } => ErrorSeverity::Low,
        }
    }

    /// Whether the caller is at fault (maps to a 4xx response)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GraphError::InvalidInput(_) | GraphError::NoUpstreamActivity { .. }
        )
    }
}

impl UpstreamError {
    /// Transient failures are worth skipping over rather than failing the request
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::Timeout { .. }
                | UpstreamError::RateLimit
                | UpstreamError::Connection(_)
                | UpstreamError::BlockNotFound { .. }
                | UpstreamError::TransactionNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let critical = GraphError::Config(ConfigError::InvalidUrl("ftp://nowhere".to_string()));
        assert_eq!(critical.severity(), ErrorSeverity::Critical);

        let high = GraphError::Upstream(UpstreamError::Connection("refused".to_string()));
        assert_eq!(high.severity(), ErrorSeverity::High);

        let medium = GraphError::Upstream(UpstreamError::Timeout {
            operation: "eth_getBlockByNumber".to_string(),
            millis: 20_000,
        });
        assert_eq!(medium.severity(), ErrorSeverity::Medium);

        let low = GraphError::NoUpstreamActivity { chain: "eth".to_string() };
        assert_eq!(low.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_client_errors() {
        let invalid = GraphError::InvalidInput(ValidationError::InvalidAddress("0x123".to_string()));
        assert!(invalid.is_client_error());

        let no_activity = GraphError::NoUpstreamActivity { chain: "bnb".to_string() };
        assert!(no_activity.is_client_error());

        let upstream = GraphError::Upstream(UpstreamError::RateLimit);
        assert!(!upstream.is_client_error());
    }

    #[test]
    fn test_transient_classification() {
        assert!(UpstreamError::BlockNotFound { block_number: 7 }.is_transient());
        assert!(UpstreamError::RateLimit.is_transient());
        assert!(!UpstreamError::InvalidResponse("bad".to_string()).is_transient());
        assert!(!UpstreamError::Method { code: -32601, message: "Method not found".to_string() }.is_transient());
    }

    #[test]
    fn test_error_display() {
        let error = GraphError::Upstream(UpstreamError::Method {
            code: -32601,
            message: "Method not found".to_string(),
        });
        assert_eq!(
            format!("{}", error),
            "Upstream error: RPC method error: code=-32601, message=Method not found"
        );

        let error = GraphError::NoUpstreamActivity { chain: "eth".to_string() };
        assert_eq!(format!("{}", error), "No recent activity for this token on eth");
    }
}
