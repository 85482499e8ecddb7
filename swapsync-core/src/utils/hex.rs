//! Hex-quantity helpers for JSON-RPC responses.
//!
//! Ethereum JSON-RPC encodes block numbers, log indices and timestamps as
//! `0x`-prefixed hex strings.

use serde::{Deserialize, Deserializer};

/// Parse a `0x`-prefixed hex quantity into a `u64`.
pub fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// Serde adapter for fields carrying hex quantities.
pub fn hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_and_bare_quantities() {
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert_eq!(parse_hex_u64("0x62").unwrap(), 98);
        assert_eq!(parse_hex_u64("ff").unwrap(), 255);
        assert!(parse_hex_u64("0xzz").is_err());
    }
}
