//! Runtime configuration
//!
//! [`RuntimeConfig`] holds the settings a single evaluation run starts from.
//! The facade clones it at the start of every run and lets pragma handlers
//! modify the clone, so `#pragma` directives never leak into the next run.

use crate::interpreter::constants::{DEFAULT_RECURSION_LIMIT, MAX_RECURSION_LIMIT};
use crate::memory::Endian;

/// Settings applied to the evaluator before the first declaration runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Byte order for declarations without a `be`/`le` prefix
    pub default_endian: Endian,
    /// Maximum nesting of function calls and type instantiations
    pub recursion_limit: u32,
    /// Upper bound on member alignment; `None` means natural alignment
    pub alignment: Option<u64>,
    /// Base address forwarded to the data source before evaluation
    pub base_address: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            default_endian: Endian::Little,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            alignment: None,
            base_address: None,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.default_endian = endian;
        self
    }

    /// Set the recursion limit, clamped to `1..=MAX_RECURSION_LIMIT`
    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit.clamp(1, MAX_RECURSION_LIMIT);
        self
    }

    /// Cap member alignment; `1` lays structs out packed
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn with_base_address(mut self, address: u64) -> Self {
        self.base_address = Some(address);
        self
    }
}

/// Parse an integer the way C's `strtoull(value, nullptr, 0)` does:
/// `0x` hex, `0b` binary, leading `0` octal, decimal otherwise.
pub fn parse_c_integer(value: &str) -> Option<i128> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i128::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i128::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };

    Some(if negative { -parsed } else { parsed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursion_limit_is_clamped() {
        let config = RuntimeConfig::new().with_recursion_limit(1_000_000);
        assert_eq!(config.recursion_limit, MAX_RECURSION_LIMIT);
        let config = RuntimeConfig::new().with_recursion_limit(0);
        assert_eq!(config.recursion_limit, 1);
    }

    #[test]
    fn test_parse_c_integer() {
        assert_eq!(parse_c_integer("0x10"), Some(16));
        assert_eq!(parse_c_integer("010"), Some(8));
        assert_eq!(parse_c_integer("0b11"), Some(3));
        assert_eq!(parse_c_integer("-5"), Some(-5));
        assert_eq!(parse_c_integer("abc"), None);
    }
}
