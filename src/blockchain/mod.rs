pub mod alchemy_client;
pub mod chains;
pub mod port;

pub use alchemy_client::{AlchemyClient, parse_hex_to_u64};
pub use chains::{Chain, DEFAULT_CHAIN, SUPPORTED_CHAINS, supported_chain_keys};
pub use port::{BlockInfo, BlockTag, ChainDataPort, TransactionInfo, TransferFilter, TransferPage};
