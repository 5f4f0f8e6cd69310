//! Memory model for the pattern evaluator
//!
//! This module provides the core memory abstractions:
//! - [`value`]: Runtime value representation (tagged integers, floats, strings)
//! - [`data_source`]: The byte-addressable capability patterns are decoded from
//!
//! # Type Sizes
//!
//! Built-in types have fixed, platform-independent sizes:
//! - `u8`/`s8`/`char`/`bool`/`padding`: 1 byte
//! - `u16`/`s16`/`char16`: 2 bytes
//! - `u32`/`s32`/`float`: 4 bytes
//! - `u64`/`s64`/`double`: 8 bytes
//! - `u128`/`s128`: 16 bytes
//!
//! Multi-byte values are decoded in the byte order active for the declaration,
//! see [`decode_builtin`].

pub mod data_source;
pub mod value;

use crate::parser::ast::BuiltinType;
use std::fmt;
use value::Value;

/// Byte order used to decode multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Byte order of the machine running the evaluator
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Parse the value of an `endian` pragma
    pub fn from_pragma(value: &str) -> Option<Self> {
        match value {
            "big" => Some(Endian::Big),
            "little" => Some(Endian::Little),
            "native" => Some(Endian::native()),
            _ => None,
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endian::Little => write!(f, "little"),
            Endian::Big => write!(f, "big"),
        }
    }
}

/// Calculate the size of a built-in type in bytes
pub fn sizeof_builtin(ty: BuiltinType) -> u64 {
    match ty {
        BuiltinType::Unsigned(width) | BuiltinType::Signed(width) => u64::from(width),
        BuiltinType::Float => 4,
        BuiltinType::Double => 8,
        BuiltinType::Char | BuiltinType::Bool | BuiltinType::Padding => 1,
        BuiltinType::Char16 => 2,
    }
}

/// Assemble up to 16 bytes into an integer honoring `endian`
pub fn bytes_to_u128(bytes: &[u8], endian: Endian) -> u128 {
    let fold = |acc: u128, b: &u8| (acc << 8) | u128::from(*b);
    match endian {
        Endian::Big => bytes.iter().fold(0, fold),
        Endian::Little => bytes.iter().rev().fold(0, fold),
    }
}

/// Decode the raw bytes of a built-in type into a [`Value`].
///
/// `bytes` must be exactly [`sizeof_builtin`] long. Padding decodes to `None`.
pub fn decode_builtin(ty: BuiltinType, bytes: &[u8], endian: Endian) -> Option<Value> {
    let raw = bytes_to_u128(bytes, endian);
    let value = match ty {
        BuiltinType::Unsigned(width) => Value::unsigned(raw, width),
        BuiltinType::Signed(width) => Value::signed(raw as i128, width),
        BuiltinType::Float => Value::Float(f64::from(f32::from_bits(raw as u32)), 4),
        BuiltinType::Double => Value::Float(f64::from_bits(raw as u64), 8),
        BuiltinType::Char => Value::Char(raw as u8),
        BuiltinType::Char16 => Value::unsigned(raw, 2),
        BuiltinType::Bool => Value::Bool(raw != 0),
        BuiltinType::Padding => return None,
    };
    Some(value)
}
