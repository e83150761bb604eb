//! Hex quantity and address helpers for the Ethereum JSON-RPC dialect.

use primitive_types::U256;

/// Length of an address without the `0x` prefix
pub const ADDRESS_LENGTH: usize = 40;

/// Encode a quantity as `0x`-prefixed lowercase hex without leading zeros.
pub fn quantity_to_hex(value: &U256) -> String {
    if value.is_zero() {
        return "0x0".to_string();
    }

    format!("0x{:x}", value)
}

/// Decode a hex quantity, with or without prefix. None past 256 bits.
pub fn hex_to_quantity(value: &str) -> Option<U256> {
    let digits = strip_hex_prefix(value);
    if digits.is_empty() || !is_hex(digits) {
        return None;
    }

    U256::from_str_radix(digits, 16).ok()
}

pub fn is_hex_address(value: &str) -> bool {
    let digits = strip_hex_prefix(value);
    digits.len() == ADDRESS_LENGTH && hex::decode(digits).is_ok()
}

/// Canonical form used as persistence key: prefixed and lower-cased.
pub fn normalize_address(value: &str) -> String {
    format!("0x{}", strip_hex_prefix(value).to_lowercase())
}

pub fn is_hex(value: &str) -> bool {
    value.bytes().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
