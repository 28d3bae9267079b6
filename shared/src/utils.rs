//! # Shared Utility Functions
//!
//! ## Address Formatting
//!
//! - [`format_address`] - `first6...last4` for addresses of at least 10 characters
//! - [`format_address_with`] - Custom prefix/suffix lengths
//! - [`format_address_value`] - Never-failing variant for untyped JSON input
//!
//! ## Usage
//!
//! ```rust
//! use shared::utils::format_address;
//!
//! let address = "8W6QginkhTTxoP2deQjq7rZ9YMwN5FH9JYuLfSKuJKAL";
//! assert_eq!(format_address(address), "8W6Qgi...JKAL");
//! ```

use serde_json::Value;

/// Minimum length an address needs before it is shortened.
const MIN_FORMAT_LEN: usize = 10;

/// Shorten an address to its first 6 and last 4 characters.
///
/// Addresses shorter than 10 characters are returned unchanged.
pub fn format_address(address: &str) -> String {
    if address.chars().count() < MIN_FORMAT_LEN {
        return address.to_string();
    }
    format_address_with(address, 6, 4)
}

/// Show the first `prefix_len` and last `suffix_len` characters.
///
/// If the address is shorter than `prefix_len + suffix_len`, it is returned as-is.
/// Counts characters, not bytes, so arbitrary input never panics.
///
/// # Examples
///
/// ```rust
/// use shared::utils::format_address_with;
///
/// let addr = "8W6QginkhTTxoP2deQjq7rZ9YMwN5FH9JYuLfSKuJKAL";
/// assert_eq!(format_address_with(addr, 4, 4), "8W6Q...JKAL");
/// assert_eq!(format_address_with("short", 4, 4), "short");
/// ```
pub fn format_address_with(address: &str, prefix_len: usize, suffix_len: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < prefix_len + suffix_len {
        return address.to_string();
    }
    let prefix: String = chars[..prefix_len].iter().collect();
    let suffix: String = chars[chars.len() - suffix_len..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// Format a value of unknown shape.
///
/// Strings go through [`format_address`]. Anything else is coerced to its JSON
/// text and truncated to 10 characters; `null` becomes an empty string.
pub fn format_address_value(value: &Value) -> String {
    match value {
        Value::String(s) => format_address(s),
        Value::Null => String::new(),
        other => other.to_string().chars().take(MIN_FORMAT_LEN).collect(),
    }
}
