//! Pattern data: the output of an evaluation run
//!
//! Every placed declaration produces one [`PatternData`] node. Composite kinds
//! (structs, unions, bitfields, arrays, pointers) own their children, so the
//! result of a run is a forest rooted at the top-level placements.
//!
//! # Colors
//!
//! Nodes are colored from a fixed palette of ten semi-transparent ARGB colors
//! handed out in creation order. [`Palette`] restarts at the first color for
//! every run, so the same program over the same data always colors the same way.

use crate::memory::value::Value;
use crate::memory::Endian;
use crate::parser::ast::BuiltinType;
use std::fmt;

/// Colors cycled through by successive patterns (`0xAARRGGBB`)
pub const PALETTE: [u32; 10] = [
    0x70b4771f, 0x700e7fff, 0x702ca02c, 0x702827d6, 0x70bd6794, 0x704b568c, 0x70c277e3, 0x707f7f7f, 0x7022bdbc,
    0x70cfbe17,
];

/// Hands out palette colors in order, wrapping after the last one
#[derive(Debug, Clone, Default)]
pub struct Palette {
    next: usize,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_color(&mut self) -> u32 {
        let color = PALETTE[self.next % PALETTE.len()];
        self.next = (self.next + 1) % PALETTE.len();
        color
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// What a pattern node represents
#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Primitive(BuiltinType),
    /// `char` array decoded as text
    String,
    Struct,
    Union,
    /// `entry` is the name of the matching enum entry, if any
    Enum { entry: Option<String> },
    Bitfield,
    BitfieldField { bit_offset: u32, bit_size: u32 },
    Array,
    Pointer,
}

impl PatternKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Primitive(_) => "primitive",
            PatternKind::String => "string",
            PatternKind::Struct => "struct",
            PatternKind::Union => "union",
            PatternKind::Enum { .. } => "enum",
            PatternKind::Bitfield => "bitfield",
            PatternKind::BitfieldField { .. } => "bitfield field",
            PatternKind::Array => "array",
            PatternKind::Pointer => "pointer",
        }
    }
}

/// One typed, addressed, sized region of the data source
#[derive(Debug, Clone, PartialEq)]
pub struct PatternData {
    pub kind: PatternKind,
    pub name: String,
    pub type_name: String,
    pub offset: u64,
    pub size: u64,
    pub endian: Endian,
    pub color: u32,
    pub children: Vec<PatternData>,
    /// Decoded value for primitives, enums, bitfield fields, pointers and strings
    pub value: Option<Value>,
}

impl PatternData {
    pub fn new(kind: PatternKind, name: impl Into<String>, type_name: impl Into<String>, offset: u64, size: u64) -> Self {
        PatternData {
            kind,
            name: name.into(),
            type_name: type_name.into(),
            offset,
            size,
            endian: Endian::default(),
            color: 0,
            children: Vec::new(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_children(mut self, children: Vec<PatternData>) -> Self {
        self.children = children;
        self
    }

    /// Last byte address covered plus one
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Direct child with the given name. Later children shadow earlier ones.
    pub fn child(&self, name: &str) -> Option<&PatternData> {
        self.children.iter().rev().find(|c| c.name == name)
    }

    /// Set the color of this node and every descendant
    pub fn paint(&mut self, color: u32) {
        self.color = color;
        for child in &mut self.children {
            child.paint(color);
        }
    }

    /// Depth-first iterator over this node and all descendants
    pub fn iter(&self) -> impl Iterator<Item = &PatternData> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Human readable value as shown next to the pattern
    pub fn format_value(&self) -> String {
        match (&self.kind, &self.value) {
            (PatternKind::Enum { entry }, Some(value)) => match entry {
                Some(entry) => format!("{}::{} ({})", self.type_name, entry, value),
                None => format!("{}::??? ({})", self.type_name, value),
            },
            (PatternKind::String, Some(value)) => format!("\"{}\"", value.to_string().escape_default()),
            (PatternKind::Pointer, Some(value)) => match value.as_u128() {
                Some(address) => format!("*(0x{:x})", address),
                None => value.to_string(),
            },
            (PatternKind::Primitive(BuiltinType::Char), Some(Value::Char(c))) => {
                format!("'{}'", char::from(*c).escape_default())
            }
            (PatternKind::Primitive(BuiltinType::Float | BuiltinType::Double), Some(value)) => value.to_string(),
            (_, Some(value @ (Value::Unsigned(..) | Value::Signed(..)))) => {
                let hex = value.as_u128().map(|v| format!("0x{:x}", v));
                match hex {
                    Some(hex) => format!("{} ({})", value, hex),
                    None => value.to_string(),
                }
            }
            (_, Some(value)) => value.to_string(),
            (PatternKind::Array, None) => format!("[{}]", self.children.len()),
            (_, None) => "{ ... }".to_string(),
        }
    }
}

impl fmt::Display for PatternData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ 0x{:x} [0x{:x}] = {}",
            self.type_name,
            self.name,
            self.offset,
            self.size,
            self.format_value()
        )
    }
}
