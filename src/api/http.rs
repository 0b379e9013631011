use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::blockchain::{supported_chain_keys, Chain, DEFAULT_CHAIN};
use crate::config::ApiConfig;
use crate::error::{GraphError, ValidationError};
use crate::logging::{ErrorLogger, LogContext};
use crate::models::{TimeWindow, TraderQueryOutcome};
use crate::pipeline::{MemoryReport, TraderGraphService};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server error: {0}")]
    Server(String),
}

/// Query parameters for `/api/traders`
#[derive(Debug, Default, Deserialize)]
pub struct TradersQuery {
    pub address: Option<String>,
    pub time: Option<String>,
    pub chain: Option<String>,
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "supportedChains", skip_serializing_if = "Option::is_none")]
    pub supported_chains: Option<Vec<String>>,
}

impl ErrorResponse {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            supported_chains: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainsResponse {
    pub supported_chains: Vec<String>,
    pub default_chain: String,
}

/// A failed trader query together with the chain it was made on
#[derive(Debug)]
pub struct TraderQueryError {
    pub chain: Chain,
    pub error: GraphError,
}

impl TraderQueryError {
    pub fn status(&self) -> StatusCode {
        if self.error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn body(&self) -> ErrorResponse {
        match &self.error {
            GraphError::InvalidInput(ValidationError::UnsupportedChain { supported, .. }) => ErrorResponse {
                error: "Invalid chain parameter".to_string(),
                details: None,
                supported_chains: Some(supported.clone()),
            },
            GraphError::InvalidInput(e) => ErrorResponse::message(e.to_string()),
            GraphError::NoUpstreamActivity { .. } => ErrorResponse::message(self.error.to_string()),
            GraphError::Upstream(e) => ErrorResponse {
                error: format!("Failed to fetch trader data on {}", self.chain),
                details: Some(e.to_string()),
                supported_chains: None,
            },
            GraphError::Config(_) | GraphError::Server(_) => ErrorResponse {
                error: format!("Failed to fetch trader data on {}", self.chain),
                details: Some(self.error.to_string()),
                supported_chains: None,
            },
        }
    }
}

impl IntoResponse for TraderQueryError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TraderGraphService>,
    /// Chain used when a request names none
    pub default_chain: Chain,
}

impl AppState {
    pub fn new(service: Arc<TraderGraphService>) -> Self {
        Self {
            service,
            default_chain: DEFAULT_CHAIN,
        }
    }

    pub fn with_default_chain(mut self, chain: Chain) -> Self {
        self.default_chain = chain;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/traders", get(get_traders))
        .route("/api/chains", get(get_chains))
        .route("/health", get(get_health))
        .route("/memory", get(get_memory))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// HTTP API server
pub struct ApiServer {
    state: AppState,
    pub host: String,
    pub port: u16,
}

impl ApiServer {
    pub fn new(service: Arc<TraderGraphService>, config: &ApiConfig) -> Self {
        let default_chain = Chain::resolve_or_default(&config.default_chain);
        Self {
            state: AppState::new(service).with_default_chain(default_chain),
            host: config.host.clone(),
            port: config.port,
        }
    }

    /// Serves until ctrl-c
    pub async fn start(&self) -> Result<(), ApiError> {
        let app = router(self.state.clone());

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("HTTP API server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Shutdown signal received, stopping HTTP API server");
                }
            })
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// GET /api/traders - Trader graph for a token contract
pub async fn get_traders(
    State(state): State<AppState>,
    Query(params): Query<TradersQuery>,
) -> Result<Json<TraderQueryOutcome>, TraderQueryError> {
    let chain = match params.chain.as_deref() {
        Some(key) => Chain::parse(key).map_err(|e| TraderQueryError {
            chain: state.default_chain,
            error: e.into(),
        })?,
        None => state.default_chain,
    };

    let window = TimeWindow::parse_lenient(params.time.as_deref().unwrap_or("all"));
    let address = params.address.unwrap_or_default();

    match state.service.query(&address, window, chain).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(error) => {
            let context = LogContext::new("http_api", "get_traders")
                .with_chain(chain.key())
                .with_address(&address)
                .with_metadata("window", serde_json::json!(window.as_str()));
            ErrorLogger::log_error(&error, Some(context));
            Err(TraderQueryError { chain, error })
        }
    }
}

/// GET /api/chains - Chains accepted by `/api/traders`
pub async fn get_chains(State(state): State<AppState>) -> Json<ChainsResponse> {
    Json(ChainsResponse {
        supported_chains: supported_chain_keys(),
        default_chain: state.default_chain.key().to_string(),
    })
}

/// GET /health - Liveness check
pub async fn get_health() -> &'static str {
    "OK"
}

/// GET /memory - Cache sizes and hit counters
pub async fn get_memory(State(state): State<AppState>) -> Json<MemoryReport> {
    Json(state.service.memory_report())
}
