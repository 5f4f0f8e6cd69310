//! Binary operators over tagged values
//!
//! Operands are promoted before the operation:
//! - `char` and `bool` behave as `u8`
//! - if either side is floating point, the result is floating point of the
//!   wider float width
//! - equal signedness keeps the signedness at the wider width
//! - mixed signedness yields unsigned when the unsigned width is at least the
//!   signed width, signed of the signed width otherwise
//!
//! Integer results wrap to the result width. Comparisons and logical operators
//! produce `bool`. Strings only support `==` and `!=`.

use crate::interpreter::errors::EvalError;
use crate::memory::value::Value;
use crate::parser::ast::{BinOp, SourceLocation};
use std::cmp::Ordering;

/// A value reduced to one of the three arithmetic classes
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Numeric {
    Unsigned(u128, u8),
    Signed(i128, u8),
    Float(f64, u8),
}

impl Numeric {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Unsigned(v, w) => Some(Numeric::Unsigned(*v, *w)),
            Value::Signed(v, w) => Some(Numeric::Signed(*v, *w)),
            Value::Float(v, w) => Some(Numeric::Float(*v, *w)),
            Value::Char(c) => Some(Numeric::Unsigned(u128::from(*c), 1)),
            Value::Bool(b) => Some(Numeric::Unsigned(u128::from(*b), 1)),
            Value::String(_) => None,
        }
    }

    fn width(&self) -> u8 {
        match self {
            Numeric::Unsigned(_, w) | Numeric::Signed(_, w) | Numeric::Float(_, w) => *w,
        }
    }

    fn bits(&self) -> u128 {
        match self {
            Numeric::Unsigned(v, _) => *v,
            Numeric::Signed(v, _) => *v as u128,
            Numeric::Float(v, _) => *v as i128 as u128,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Numeric::Unsigned(v, _) => *v as f64,
            Numeric::Signed(v, _) => *v as f64,
            Numeric::Float(v, _) => *v,
        }
    }
}

/// Result class of an arithmetic operation on two operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Promoted {
    Unsigned(u8),
    Signed(u8),
    Float(u8),
}

fn promote(left: Numeric, right: Numeric) -> Promoted {
    use Numeric::*;
    match (left, right) {
        (Float(_, a), Float(_, b)) => Promoted::Float(a.max(b)),
        (Float(_, w), _) | (_, Float(_, w)) => Promoted::Float(w),
        (Unsigned(_, a), Unsigned(_, b)) => Promoted::Unsigned(a.max(b)),
        (Signed(_, a), Signed(_, b)) => Promoted::Signed(a.max(b)),
        (Unsigned(_, u), Signed(_, s)) | (Signed(_, s), Unsigned(_, u)) => {
            if u >= s {
                Promoted::Unsigned(u)
            } else {
                Promoted::Signed(s)
            }
        }
    }
}

fn operand(value: &Value, op: BinOp, location: SourceLocation) -> Result<Numeric, EvalError> {
    Numeric::from_value(value)
        .ok_or_else(|| EvalError::type_error(format!("numeric operand for '{}'", op), value.kind_name(), location))
}

fn integral(value: &Value, op: BinOp, location: SourceLocation) -> Result<Numeric, EvalError> {
    match operand(value, op, location)? {
        Numeric::Float(..) => Err(EvalError::type_error(
            format!("integral operand for '{}'", op),
            value.kind_name(),
            location,
        )),
        n => Ok(n),
    }
}

/// Apply `op` to two already evaluated operands.
///
/// `&&` and `||` are evaluated eagerly here; the evaluator short-circuits
/// before calling this.
pub fn apply_binary(op: BinOp, left: &Value, right: &Value, location: SourceLocation) -> Result<Value, EvalError> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match op {
            BinOp::Eq => Ok(Value::Bool(a == b)),
            BinOp::Ne => Ok(Value::Bool(a != b)),
            _ => Err(EvalError::type_error(
                format!("numeric operands for '{}'", op),
                "string",
                location,
            )),
        };
    }

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let (a, b) = (operand(left, op, location)?, operand(right, op, location)?);
            arithmetic(op, a, b, location)
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let (a, b) = (operand(left, op, location)?, operand(right, op, location)?);
            let ordering = compare(a, b);
            let result = match op {
                BinOp::Eq => ordering == Some(Ordering::Equal),
                BinOp::Ne => ordering != Some(Ordering::Equal),
                BinOp::Lt => ordering == Some(Ordering::Less),
                BinOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                BinOp::Gt => ordering == Some(Ordering::Greater),
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            };
            Ok(Value::Bool(result))
        }
        BinOp::And | BinOp::Or => {
            let truth = |v: &Value| {
                v.as_bool()
                    .ok_or_else(|| EvalError::type_error("boolean operand", v.kind_name(), location))
            };
            let (a, b) = (truth(left)?, truth(right)?);
            Ok(Value::Bool(if op == BinOp::And { a && b } else { a || b }))
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            let (a, b) = (integral(left, op, location)?, integral(right, op, location)?);
            let bits = match op {
                BinOp::BitAnd => a.bits() & b.bits(),
                BinOp::BitOr => a.bits() | b.bits(),
                _ => a.bits() ^ b.bits(),
            };
            Ok(match promote(a, b) {
                Promoted::Signed(w) => Value::signed(bits as i128, w),
                Promoted::Unsigned(w) | Promoted::Float(w) => Value::unsigned(bits, w),
            })
        }
        BinOp::BitShl | BinOp::BitShr => {
            let (a, b) = (integral(left, op, location)?, integral(right, op, location)?);
            if matches!(b, Numeric::Signed(v, _) if v < 0) {
                return Err(EvalError::type_error("non-negative shift amount", "negative value", location));
            }
            Ok(shift(op, a, b.bits()))
        }
    }
}

fn arithmetic(op: BinOp, a: Numeric, b: Numeric, location: SourceLocation) -> Result<Value, EvalError> {
    match promote(a, b) {
        Promoted::Float(w) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            if matches!(op, BinOp::Div | BinOp::Mod) && y == 0.0 {
                return Err(EvalError::DivisionByZero { location });
            }
            let result = match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Div => x / y,
                _ => x % y,
            };
            let result = if w == 4 { f64::from(result as f32) } else { result };
            Ok(Value::Float(result, w))
        }
        Promoted::Unsigned(w) => {
            let (x, y) = (a.bits(), b.bits());
            let (x, y) = (
                crate::memory::value::wrap_unsigned(x, w),
                crate::memory::value::wrap_unsigned(y, w),
            );
            let result = match op {
                BinOp::Add => x.wrapping_add(y),
                BinOp::Sub => x.wrapping_sub(y),
                BinOp::Mul => x.wrapping_mul(y),
                BinOp::Div => x.checked_div(y).ok_or(EvalError::DivisionByZero { location })?,
                _ => x.checked_rem(y).ok_or(EvalError::DivisionByZero { location })?,
            };
            Ok(Value::unsigned(result, w))
        }
        Promoted::Signed(w) => {
            let (x, y) = (a.bits() as i128, b.bits() as i128);
            if matches!(op, BinOp::Div | BinOp::Mod) && y == 0 {
                return Err(EvalError::DivisionByZero { location });
            }
            let result = match op {
                BinOp::Add => x.wrapping_add(y),
                BinOp::Sub => x.wrapping_sub(y),
                BinOp::Mul => x.wrapping_mul(y),
                BinOp::Div => x.wrapping_div(y),
                _ => x.wrapping_rem(y),
            };
            Ok(Value::signed(result, w))
        }
    }
}

fn compare(a: Numeric, b: Numeric) -> Option<Ordering> {
    match promote(a, b) {
        Promoted::Float(_) => a.as_f64().partial_cmp(&b.as_f64()),
        Promoted::Signed(_) => Some((a.bits() as i128).cmp(&(b.bits() as i128))),
        Promoted::Unsigned(w) => {
            let wrap = |v| crate::memory::value::wrap_unsigned(v, w);
            Some(wrap(a.bits()).cmp(&wrap(b.bits())))
        }
    }
}

/// Shift keeps the type of the left operand; shifting by the bit width or more yields 0
fn shift(op: BinOp, value: Numeric, amount: u128) -> Value {
    let width = value.width();
    let bits = u128::from(width) * 8;

    match value {
        Numeric::Signed(v, w) => {
            let result = if amount >= bits {
                if op == BinOp::BitShr && v < 0 {
                    -1
                } else {
                    0
                }
            } else if op == BinOp::BitShl {
                v << amount
            } else {
                v >> amount
            };
            Value::signed(result, w)
        }
        _ => {
            let v = value.bits();
            let result = if amount >= bits {
                0
            } else if op == BinOp::BitShl {
                v << amount
            } else {
                v >> amount
            };
            Value::unsigned(result, width)
        }
    }
}
