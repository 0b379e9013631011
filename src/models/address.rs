use crate::blockchain::Chain;
use crate::error::ValidationError;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Check that a token contract address is well formed for the chain.
///
/// EVM chains take `0x` followed by 40 hex digits. Solana takes a base58
/// mint address.
pub fn validate_address(address: &str, chain: Chain) -> Result<(), ValidationError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ValidationError::InvalidAddress(
            "Token address is required".to_string(),
        ));
    }

    match chain {
        Chain::Sol => validate_base58(address),
        _ => validate_hex(address),
    }
}

fn validate_hex(address: &str) -> Result<(), ValidationError> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| {
            ValidationError::InvalidAddress(format!("Address must start with 0x: {}", address))
        })?;

    if digits.len() != 40 {
        return Err(ValidationError::InvalidAddress(format!(
            "Address must be 40 hex characters long, got {}",
            digits.len()
        )));
    }

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidAddress(
            "Address contains non-hexadecimal characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_base58(address: &str) -> Result<(), ValidationError> {
    if !(32..=44).contains(&address.len()) {
        return Err(ValidationError::InvalidAddress(format!(
            "Solana address must be 32 to 44 characters long, got {}",
            address.len()
        )));
    }

    if !address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
        return Err(ValidationError::InvalidAddress(
            "Address contains non-base58 characters".to_string(),
        ));
    }

    Ok(())
}

/// Form used in cache keys. Hex addresses are case-insensitive, base58 ones are not.
pub fn normalize_address(address: &str, chain: Chain) -> String {
    match chain {
        Chain::Sol => address.trim().to_string(),
        _ => address.trim().to_lowercase(),
    }
}
