//! Unary operators over tagged values
//!
//! Dereference is not handled here: it needs the pointer pattern, so the
//! evaluator resolves `*ptr` itself.

use super::binary::Numeric;
use crate::interpreter::errors::EvalError;
use crate::memory::value::Value;
use crate::parser::ast::{SourceLocation, UnOp};

pub fn apply_unary(op: UnOp, operand: &Value, location: SourceLocation) -> Result<Value, EvalError> {
    let numeric = Numeric::from_value(operand)
        .ok_or_else(|| EvalError::type_error("numeric operand", operand.kind_name(), location))?;

    match op {
        UnOp::Plus => Ok(operand.clone()),
        UnOp::Neg => Ok(match numeric {
            Numeric::Unsigned(v, w) => Value::unsigned(v.wrapping_neg(), w),
            Numeric::Signed(v, w) => Value::signed(v.wrapping_neg(), w),
            Numeric::Float(v, w) => Value::Float(-v, w),
        }),
        UnOp::Not => Ok(Value::Bool(!operand.as_bool().unwrap_or(false))),
        UnOp::BitNot => match numeric {
            Numeric::Unsigned(v, w) => Ok(Value::unsigned(!v, w)),
            Numeric::Signed(v, w) => Ok(Value::signed(!v, w)),
            Numeric::Float(..) => Err(EvalError::type_error("integral operand for '~'", operand.kind_name(), location)),
        },
        UnOp::Deref => Err(EvalError::type_error("pointer", operand.kind_name(), location)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(op: UnOp, value: Value) -> Result<Value, EvalError> {
        apply_unary(op, &value, SourceLocation::new(1, 1))
    }

    #[test]
    fn test_negation_wraps_in_width() {
        assert_eq!(eval(UnOp::Neg, Value::Signed(5, 4)), Ok(Value::Signed(-5, 4)));
        assert_eq!(eval(UnOp::Neg, Value::Unsigned(1, 1)), Ok(Value::Unsigned(0xFF, 1)));
        assert_eq!(eval(UnOp::Neg, Value::Float(1.5, 8)), Ok(Value::Float(-1.5, 8)));
    }

    #[test]
    fn test_bitwise_not() {
        assert_eq!(eval(UnOp::BitNot, Value::Unsigned(0x0F, 1)), Ok(Value::Unsigned(0xF0, 1)));
        assert_eq!(eval(UnOp::BitNot, Value::Char(0)), Ok(Value::Unsigned(0xFF, 1)));
        assert!(eval(UnOp::BitNot, Value::Float(1.0, 4)).is_err());
    }

    #[test]
    fn test_logical_not_and_strings() {
        assert_eq!(eval(UnOp::Not, Value::Signed(0, 4)), Ok(Value::Bool(true)));
        assert_eq!(eval(UnOp::Not, Value::Bool(true)), Ok(Value::Bool(false)));
        assert!(eval(UnOp::Neg, Value::String("x".into())).is_err());
    }
}
