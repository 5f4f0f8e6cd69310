//! Constant folding over expression trees that do not touch the data source

use crate::interpreter::ops::{apply_binary, apply_unary};
use crate::memory::value::Value;
use crate::parser::ast::{AstNode, BinOp, UnOp};

/// Fold `node` to a value if it consists only of literals and operators.
///
/// Returns `None` for anything that depends on the data, on variables or on
/// function calls, and for operations that would fault (e.g. division by zero).
pub fn fold_constant(node: &AstNode) -> Option<Value> {
    match node {
        AstNode::Literal(value, _) => Some(value.clone()),
        AstNode::StringLiteral(s, _) => Some(Value::String(s.clone())),
        AstNode::UnaryOp { op: UnOp::Deref, .. } => None,
        AstNode::UnaryOp { op, operand, location } => apply_unary(*op, &fold_constant(operand)?, *location).ok(),
        AstNode::BinaryOp {
            op: op @ (BinOp::And | BinOp::Or),
            left,
            right,
            ..
        } => {
            let left = fold_constant(left)?.as_bool()?;
            match (op, left) {
                (BinOp::And, false) => Some(Value::Bool(false)),
                (BinOp::Or, true) => Some(Value::Bool(true)),
                _ => Some(Value::Bool(fold_constant(right)?.as_bool()?)),
            }
        }
        AstNode::BinaryOp {
            op,
            left,
            right,
            location,
        } => apply_binary(*op, &fold_constant(left)?, &fold_constant(right)?, *location).ok(),
        AstNode::TernaryOp {
            condition,
            true_expr,
            false_expr,
            ..
        } => {
            if fold_constant(condition)?.as_bool()? {
                fold_constant(true_expr)
            } else {
                fold_constant(false_expr)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn fold(source: &str) -> Option<Value> {
        let mut parser = Parser::new(source).unwrap();
        let expr = parser.parse_expression().unwrap();
        fold_constant(&expr)
    }

    #[test]
    fn test_folds_arithmetic() {
        assert_eq!(fold("2 * (3 + 4)"), Some(Value::Signed(14, 4)));
        assert_eq!(fold("1 << 4 | 1"), Some(Value::Signed(17, 4)));
        assert_eq!(fold("0 ? 1 : 2"), Some(Value::Signed(2, 4)));
    }

    #[test]
    fn test_rejects_runtime_values() {
        assert_eq!(fold("$ + 1"), None);
        assert_eq!(fold("header.count"), None);
        assert_eq!(fold("std::mem::size()"), None);
        assert_eq!(fold("1 / 0"), None);
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(fold("0 && x"), Some(Value::Bool(false)));
        assert_eq!(fold("1 || x"), Some(Value::Bool(true)));
    }
}
