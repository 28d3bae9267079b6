//! Chain-specific address checks.

use crate::core::error::{FabricError, Result};
use shared::dto::{Chain, ChainFamily};

pub fn is_valid_address(address: &str, chain: Chain) -> bool {
    match chain.family() {
        ChainFamily::Evm => lib_utils::is_valid_evm_address(address),
        ChainFamily::Solana => lib_utils::is_valid_solana_address(address),
    }
}

pub fn validate_address(address: &str, chain: Chain) -> Result<()> {
    if is_valid_address(address, chain) {
        Ok(())
    } else {
        Err(FabricError::Validation(format!(
            "invalid {} address: {}",
            chain.family(),
            shared::utils::format_address(address)
        )))
    }
}

/// EVM addresses compare case-insensitively (checksum casing is cosmetic);
/// base58 is case-sensitive.
pub fn addresses_match(a: &str, b: &str, chain: Chain) -> bool {
    match chain.family() {
        ChainFamily::Evm => a.eq_ignore_ascii_case(b),
        ChainFamily::Solana => a == b,
    }
}
