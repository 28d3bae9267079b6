//! # Utilities Library
//!
//! Shared utility functions for environment variables, time and chain address validation.

pub mod envs;
pub mod time;
pub mod validation;

// Re-export commonly used functions
pub use envs::{get_env, get_env_list, get_env_or, get_env_parse};
pub use time::{format_time, millis_to_utc, now_millis, now_utc, parse_utc};
pub use validation::{is_valid_evm_address, is_valid_solana_address, validate_not_empty};
