use trader_graph::blockchain::{supported_chain_keys, Chain};
use trader_graph::cache::result_key;
use trader_graph::error::{GraphError, ValidationError};
use trader_graph::models::{normalize_address, validate_address, TimeWindow};

const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

#[test]
fn test_every_chain_key_round_trips() {
    for key in supported_chain_keys() {
        let chain = Chain::parse(&key).unwrap();
        assert_eq!(chain.key(), key);
        assert_eq!(serde_json::to_value(chain).unwrap(), key);
    }
}

#[test]
fn test_unknown_chain_lists_supported() {
    let err = Chain::parse("doge").unwrap_err();
    match &err {
        ValidationError::UnsupportedChain { chain, supported } => {
            assert_eq!(chain, "doge");
            assert_eq!(supported, &supported_chain_keys());
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(GraphError::from(err).is_client_error());
}

#[test]
fn test_evm_addresses_on_every_evm_chain() {
    for key in supported_chain_keys().iter().filter(|k| k.as_str() != "sol") {
        let chain = Chain::parse(key).unwrap();
        assert!(validate_address(USDT, chain).is_ok(), "{} rejected a checksummed address", key);
        assert!(validate_address(USDC_MINT, chain).is_err(), "{} accepted a base58 address", key);
    }
}

#[test]
fn test_solana_mint_addresses() {
    assert!(validate_address(USDC_MINT, Chain::Sol).is_ok());
    assert!(validate_address(USDT, Chain::Sol).is_err());
    // 0, O, I and l are not base58
    assert!(validate_address("0PjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", Chain::Sol).is_err());
}

#[test]
fn test_surrounding_whitespace_is_ignored() {
    assert!(validate_address(&format!("  {} ", USDT), Chain::Eth).is_ok());
    assert_eq!(normalize_address(&format!(" {}", USDT), Chain::Eth), USDT.to_lowercase());
}

#[test]
fn test_result_keys() {
    assert_eq!(
        result_key(Chain::Eth, USDT, TimeWindow::Hours24),
        format!("eth-{}-24h", USDT.to_lowercase())
    );
    assert_eq!(
        result_key(Chain::Sol, USDC_MINT, TimeWindow::All),
        format!("sol-{}-all", USDC_MINT)
    );
    assert_ne!(
        result_key(Chain::Eth, USDT, TimeWindow::All),
        result_key(Chain::Base, USDT, TimeWindow::All)
    );
}

#[test]
fn test_unknown_window_falls_back_to_all() {
    assert_eq!(TimeWindow::parse_lenient("forever"), TimeWindow::All);
    assert_eq!(TimeWindow::parse_lenient(""), TimeWindow::All);
    assert_eq!(TimeWindow::parse_lenient("7d"), TimeWindow::Days7);
    assert_eq!(TimeWindow::Days7.duration_seconds(), Some(604_800));
}
