//! Runtime value representation
//!
//! This module defines the [`Value`] enum, the tagged literal every expression
//! evaluates to. Integer variants carry their width in bytes so that arithmetic
//! can apply the promotion rules in [`crate::interpreter::ops::binary`].
//!
//! # Value Kinds
//!
//! - [`Value::Unsigned`]: unsigned integer of 1, 2, 4, 8 or 16 bytes
//! - [`Value::Signed`]: two's complement integer of 1, 2, 4, 8 or 16 bytes
//! - [`Value::Float`]: `float` (4 bytes) or `double` (8 bytes)
//! - [`Value::Char`]: a single-byte character
//! - [`Value::Bool`]: boolean, produced by comparisons and logical operators
//! - [`Value::String`]: string literal or decoded `char[]`
//!
//! Values are always normalized: an `Unsigned(v, 2)` never holds bits above
//! bit 15 and a `Signed(v, 1)` is always within `i8` range.

use crate::parser::ast::BuiltinType;
use std::fmt;

/// Runtime values in the evaluator
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unsigned(u128, u8),
    Signed(i128, u8),
    Float(f64, u8),
    Char(u8),
    Bool(bool),
    String(String),
}

/// Truncate `value` to `width` bytes.
pub fn wrap_unsigned(value: u128, width: u8) -> u128 {
    if width >= 16 {
        value
    } else {
        value & ((1u128 << (u32::from(width) * 8)) - 1)
    }
}

/// Truncate `value` to `width` bytes and sign-extend the result.
pub fn wrap_signed(value: i128, width: u8) -> i128 {
    if width >= 16 {
        value
    } else {
        let shift = 128 - u32::from(width) * 8;
        (value << shift) >> shift
    }
}

impl Value {
    pub fn unsigned(value: u128, width: u8) -> Self {
        Value::Unsigned(wrap_unsigned(value, width), width)
    }

    pub fn signed(value: i128, width: u8) -> Self {
        Value::Signed(wrap_signed(value, width), width)
    }

    /// Human readable name of the variant, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unsigned(..) => "unsigned integer",
            Value::Signed(..) => "signed integer",
            Value::Float(..) => "floating point",
            Value::Char(_) => "character",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
        }
    }

    /// Whether this is one of the numeric literal kinds (everything but strings)
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::String(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Truthiness used by conditions; `None` for strings
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Unsigned(v, _) => Some(*v != 0),
            Value::Signed(v, _) => Some(*v != 0),
            Value::Float(v, _) => Some(*v != 0.0),
            Value::Char(c) => Some(*c != 0),
            Value::Bool(b) => Some(*b),
            Value::String(_) => None,
        }
    }

    /// Reinterpret as an unsigned 128-bit integer. Negative values and
    /// non-integral floats are rejected.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Value::Unsigned(v, _) => Some(*v),
            Value::Signed(v, _) => u128::try_from(*v).ok(),
            Value::Float(v, _) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u128),
            Value::Float(..) => None,
            Value::Char(c) => Some(u128::from(*c)),
            Value::Bool(b) => Some(u128::from(*b)),
            Value::String(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_u128().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Unsigned(v, _) => i128::try_from(*v).ok(),
            Value::Signed(v, _) => Some(*v),
            Value::Float(v, _) if v.fract() == 0.0 => Some(*v as i128),
            Value::Float(..) => None,
            Value::Char(c) => Some(i128::from(*c)),
            Value::Bool(b) => Some(i128::from(*b)),
            Value::String(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Unsigned(v, _) => Some(*v as f64),
            Value::Signed(v, _) => Some(*v as f64),
            Value::Float(v, _) => Some(*v),
            Value::Char(c) => Some(f64::from(*c)),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to the literal kind a built-in type decodes to.
    /// Returns `None` for strings and for the `padding` type.
    pub fn cast_to(&self, ty: BuiltinType) -> Option<Value> {
        if self.is_string() {
            return None;
        }
        let bits = self
            .as_i128()
            .or_else(|| self.as_u128().map(|v| v as i128))
            .or_else(|| self.as_f64().map(|v| v as i128))?;

        let value = match ty {
            BuiltinType::Unsigned(width) => Value::unsigned(bits as u128, width),
            BuiltinType::Signed(width) => Value::signed(bits, width),
            BuiltinType::Float => Value::Float(f64::from(self.as_f64()? as f32), 4),
            BuiltinType::Double => Value::Float(self.as_f64()?, 8),
            BuiltinType::Char => Value::Char(bits as u8),
            BuiltinType::Char16 => Value::unsigned(bits as u128, 2),
            BuiltinType::Bool => Value::Bool(self.as_bool()?),
            BuiltinType::Padding => return None,
        };
        Some(value)
    }
}

impl fmt::Display for Value {
    /// Renders the value the way `std::print` concatenates it
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v, _) => write!(f, "{}", v),
            Value::Signed(v, _) => write!(f, "{}", v),
            Value::Float(v, _) => write!(f, "{:.6}", v),
            Value::Char(c) => write!(f, "{}", *c as char),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_normalizes_width() {
        assert_eq!(Value::unsigned(0x1_23, 1), Value::Unsigned(0x23, 1));
        assert_eq!(Value::signed(0xFF, 1), Value::Signed(-1, 1));
        assert_eq!(Value::signed(-129, 1), Value::Signed(127, 1));
        assert_eq!(wrap_unsigned(u128::MAX, 16), u128::MAX);
    }

    #[test]
    fn test_cast_to_builtin() {
        let v = Value::Signed(-1, 4);
        assert_eq!(v.cast_to(BuiltinType::Unsigned(2)), Some(Value::Unsigned(0xFFFF, 2)));
        assert_eq!(Value::Unsigned(65, 1).cast_to(BuiltinType::Char), Some(Value::Char(b'A')));
        assert_eq!(Value::Unsigned(2, 1).cast_to(BuiltinType::Bool), Some(Value::Bool(true)));
        assert_eq!(Value::String("x".into()).cast_to(BuiltinType::Unsigned(1)), None);
    }

    #[test]
    fn test_display_matches_print_rendering() {
        assert_eq!(Value::Char(b'a').to_string(), "a");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Signed(-12, 4).to_string(), "-12");
        assert_eq!(Value::Float(1.5, 8).to_string(), "1.500000");
        assert_eq!(Value::Float(-0.1, 4).to_string(), "-0.100000");
        assert_eq!(Value::Float(3.0, 8).to_string(), "3.000000");
    }

    #[test]
    fn test_conversions_reject_strings() {
        let s = Value::String("abc".into());
        assert!(s.as_bool().is_none());
        assert!(s.as_u128().is_none());
        assert_eq!(s.as_str(), Some("abc"));
        assert_eq!(Value::Signed(-1, 4).as_u128(), None);
    }
}
