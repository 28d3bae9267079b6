//! # Validation Utilities
//!
//! Input validation helpers, including chain-specific address checks.

/// Validate that a string is not empty.
pub fn validate_not_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// EVM address: `^0x[0-9a-fA-F]{40}$`.
pub fn is_valid_evm_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Solana address: base58 text decoding to a 32-byte public key.
pub fn is_valid_solana_address(address: &str) -> bool {
    if address.len() < 32 || address.len() > 44 {
        return false;
    }
    bs58::decode(address)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("x", "field").is_ok());
        assert_eq!(
            validate_not_empty("  ", "address").unwrap_err(),
            "address cannot be empty"
        );
    }

    #[test]
    fn test_evm_address() {
        assert!(is_valid_evm_address("0x52908400098527886E0F7030069857D2E4169EE7"));
        assert!(is_valid_evm_address("0xde709f2102306220921060314715629080e2fb77"));
        assert!(!is_valid_evm_address("52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!is_valid_evm_address("0x52908400098527886E0F7030069857D2E4169EE"));
        assert!(!is_valid_evm_address("0xZZ908400098527886E0F7030069857D2E4169EE7"));
    }

    #[test]
    fn test_solana_address() {
        assert!(is_valid_solana_address("So11111111111111111111111111111111111111112"));
        assert!(is_valid_solana_address("8W6QginkhTTxoP2deQjq7rZ9YMwN5FH9JYuLfSKuJKAL"));
        // '0' and 'l' are not in the base58 alphabet
        assert!(!is_valid_solana_address("0W6QginkhTTxoP2deQjq7rZ9YMwN5FH9JYuLfSKuJKAl"));
        assert!(!is_valid_solana_address("short"));
    }
}
