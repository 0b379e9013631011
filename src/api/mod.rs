pub mod cli;
pub mod http;

pub use cli::{Cli, CliError, CliHandler, Commands};
pub use http::{
    get_chains, get_health, get_memory, get_traders, router, ApiError, ApiServer, AppState, ChainsResponse,
    ErrorResponse, TraderQueryError, TradersQuery,
};
