// AST (Abstract Syntax Tree) definitions for the pattern language

use crate::memory::value::Value;
use crate::memory::Endian;
use std::fmt;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Ordered sequence of namespace segments, e.g. `std::mem`.
///
/// Used as the key for both type lookups and builtin-function lookups; two
/// paths are equal iff their segment sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NamespacePath(pub Vec<String>);

impl NamespacePath {
    pub fn root() -> Self {
        NamespacePath(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Append the segments of `other` to this path
    pub fn join(&self, other: &[String]) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.iter().cloned());
        NamespacePath(segments)
    }

    /// Fully qualified `a::b::name` key for a symbol declared in this namespace
    pub fn qualify(&self, name: &str) -> String {
        if self.0.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", self, name)
        }
    }

    /// This path followed by each of its ancestors down to the root
    pub fn ancestors(&self) -> impl Iterator<Item = NamespacePath> + '_ {
        (0..=self.0.len()).rev().map(move |n| NamespacePath(self.0[..n].to_vec()))
    }
}

impl From<&[&str]> for NamespacePath {
    fn from(segments: &[&str]) -> Self {
        NamespacePath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("::"))
    }
}

/// Built-in value types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    Unsigned(u8), // width in bytes
    Signed(u8),
    Float,
    Double,
    Char,
    Char16,
    Bool,
    Padding,
}

impl BuiltinType {
    pub fn from_keyword(word: &str) -> Option<Self> {
        let ty = match word {
            "u8" => BuiltinType::Unsigned(1),
            "u16" => BuiltinType::Unsigned(2),
            "u32" => BuiltinType::Unsigned(4),
            "u64" => BuiltinType::Unsigned(8),
            "u128" => BuiltinType::Unsigned(16),
            "s8" => BuiltinType::Signed(1),
            "s16" => BuiltinType::Signed(2),
            "s32" => BuiltinType::Signed(4),
            "s64" => BuiltinType::Signed(8),
            "s128" => BuiltinType::Signed(16),
            "float" => BuiltinType::Float,
            "double" => BuiltinType::Double,
            "char" => BuiltinType::Char,
            "char16" => BuiltinType::Char16,
            "bool" => BuiltinType::Bool,
            "padding" => BuiltinType::Padding,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinType::Unsigned(1) => "u8",
            BuiltinType::Unsigned(2) => "u16",
            BuiltinType::Unsigned(4) => "u32",
            BuiltinType::Unsigned(8) => "u64",
            BuiltinType::Unsigned(_) => "u128",
            BuiltinType::Signed(1) => "s8",
            BuiltinType::Signed(2) => "s16",
            BuiltinType::Signed(4) => "s32",
            BuiltinType::Signed(8) => "s64",
            BuiltinType::Signed(_) => "s128",
            BuiltinType::Float => "float",
            BuiltinType::Double => "double",
            BuiltinType::Char => "char",
            BuiltinType::Char16 => "char16",
            BuiltinType::Bool => "bool",
            BuiltinType::Padding => "padding",
        }
    }

    /// Integer-like types usable as enum underlying types and pointer sizes
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            BuiltinType::Unsigned(_) | BuiltinType::Signed(_) | BuiltinType::Char | BuiltinType::Char16 | BuiltinType::Bool
        )
    }
}

/// What a type reference names
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Builtin(BuiltinType),
    Named(Vec<String>), // possibly namespace-qualified
}

/// Type reference with optional `be`/`le` prefix
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub endian: Option<Endian>,
    pub kind: TypeKind,
    pub location: SourceLocation,
}

impl TypeRef {
    pub fn builtin(ty: BuiltinType, location: SourceLocation) -> Self {
        TypeRef {
            endian: None,
            kind: TypeKind::Builtin(ty),
            location,
        }
    }

    /// Name shown for patterns of this type
    pub fn display_name(&self) -> String {
        match &self.kind {
            TypeKind::Builtin(ty) => ty.name().to_string(),
            TypeKind::Named(path) => path.join("::"),
        }
    }
}

/// Element count of an array declaration
#[derive(Debug, Clone)]
pub enum ArraySize {
    Fixed(Box<AstNode>),
    While(Box<AstNode>),
    Unsized, // until a zero element, inclusive
}

/// `Name [= value]` inside an enum body
#[derive(Debug, Clone)]
pub struct EnumEntry {
    pub name: String,
    pub value: Option<AstNode>,
    pub location: SourceLocation,
}

/// `name : width;` inside a bitfield body. `name` is `None` for padding bits.
#[derive(Debug, Clone)]
pub struct BitfieldField {
    pub name: Option<String>,
    pub width: AstNode,
    pub location: SourceLocation,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitShl,
    BitShr,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitShl => "<<",
            BinOp::BitShr => ">>",
        };
        write!(f, "{}", symbol)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,    // -x
    Plus,   // +x
    Not,    // !x
    BitNot, // ~x
    Deref,  // *ptr
}

/// Operand of `sizeof`
#[derive(Debug, Clone)]
pub enum SizeofOperand {
    Type(TypeRef),
    Expr(Box<AstNode>),
}

/// AST nodes representing declarations, statements and expressions
#[derive(Debug, Clone)]
pub enum AstNode {
    // Type declarations
    StructDef {
        name: String,
        members: Vec<AstNode>,
        location: SourceLocation,
    },
    UnionDef {
        name: String,
        members: Vec<AstNode>,
        location: SourceLocation,
    },
    EnumDef {
        name: String,
        underlying: TypeRef,
        entries: Vec<EnumEntry>,
        location: SourceLocation,
    },
    BitfieldDef {
        name: String,
        fields: Vec<BitfieldField>,
        location: SourceLocation,
    },
    Using {
        name: String,
        target: TypeRef,
        location: SourceLocation,
    },
    Namespace {
        path: Vec<String>,
        body: Vec<AstNode>,
        location: SourceLocation,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<AstNode>,
        location: SourceLocation,
    },

    // Variable declarations
    VarDecl {
        name: String,
        var_type: TypeRef,
        placement: Option<Box<AstNode>>,
        init: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    ArrayDecl {
        name: String,
        elem_type: TypeRef,
        size: ArraySize,
        placement: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    PointerDecl {
        name: String,
        pointee: TypeRef,
        size_type: TypeRef,
        placement: Option<Box<AstNode>>,
        location: SourceLocation,
    },

    // Statements
    If {
        condition: Box<AstNode>,
        then_branch: Vec<AstNode>,
        else_branch: Option<Vec<AstNode>>,
        location: SourceLocation,
    },
    While {
        condition: Box<AstNode>,
        body: Vec<AstNode>,
        location: SourceLocation,
    },
    Return {
        expr: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    Assignment {
        name: String,
        rhs: Box<AstNode>,
        location: SourceLocation,
    },
    ExpressionStatement {
        expr: Box<AstNode>,
        location: SourceLocation,
    },

    // Expressions
    Literal(Value, SourceLocation),
    StringLiteral(String, SourceLocation),
    Identifier(String, SourceLocation),
    ScopedName {
        path: Vec<String>,
        location: SourceLocation,
    },
    CurrentOffset(SourceLocation),
    Parent(SourceLocation),
    MemberAccess {
        object: Box<AstNode>,
        member: String,
        location: SourceLocation,
    },
    ArrayAccess {
        array: Box<AstNode>,
        index: Box<AstNode>,
        location: SourceLocation,
    },
    BinaryOp {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
        location: SourceLocation,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<AstNode>,
        location: SourceLocation,
    },
    TernaryOp {
        condition: Box<AstNode>,
        true_expr: Box<AstNode>,
        false_expr: Box<AstNode>,
        location: SourceLocation,
    },
    FunctionCall {
        path: NamespacePath,
        name: String,
        args: Vec<AstNode>,
        location: SourceLocation,
    },
    SizeOf {
        operand: SizeofOperand,
        location: SourceLocation,
    },
    AddressOf {
        expr: Box<AstNode>,
        location: SourceLocation,
    },
}

impl AstNode {
    /// Get the source location of this node
    pub fn location(&self) -> SourceLocation {
        match self {
            AstNode::StructDef { location, .. }
            | AstNode::UnionDef { location, .. }
            | AstNode::EnumDef { location, .. }
            | AstNode::BitfieldDef { location, .. }
            | AstNode::Using { location, .. }
            | AstNode::Namespace { location, .. }
            | AstNode::FunctionDef { location, .. }
            | AstNode::VarDecl { location, .. }
            | AstNode::ArrayDecl { location, .. }
            | AstNode::PointerDecl { location, .. }
            | AstNode::If { location, .. }
            | AstNode::While { location, .. }
            | AstNode::Return { location, .. }
            | AstNode::Assignment { location, .. }
            | AstNode::ExpressionStatement { location, .. }
            | AstNode::ScopedName { location, .. }
            | AstNode::MemberAccess { location, .. }
            | AstNode::ArrayAccess { location, .. }
            | AstNode::BinaryOp { location, .. }
            | AstNode::UnaryOp { location, .. }
            | AstNode::TernaryOp { location, .. }
            | AstNode::FunctionCall { location, .. }
            | AstNode::SizeOf { location, .. }
            | AstNode::AddressOf { location, .. } => *location,
            AstNode::Literal(_, loc)
            | AstNode::StringLiteral(_, loc)
            | AstNode::Identifier(_, loc)
            | AstNode::CurrentOffset(loc)
            | AstNode::Parent(loc) => *loc,
        }
    }

    /// Name introduced by a type declaration, if this is one
    pub fn type_name(&self) -> Option<&str> {
        match self {
            AstNode::StructDef { name, .. }
            | AstNode::UnionDef { name, .. }
            | AstNode::EnumDef { name, .. }
            | AstNode::BitfieldDef { name, .. }
            | AstNode::Using { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Name of the pattern a variable declaration creates
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            AstNode::VarDecl { name, .. }
            | AstNode::ArrayDecl { name, .. }
            | AstNode::PointerDecl { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Top-level program structure
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub nodes: Vec<AstNode>, // All top-level declarations
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }
}
