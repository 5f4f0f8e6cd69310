//! Expression evaluation
//!
//! Expressions evaluate to a [`Value`]. Paths (`a`, `a.b`, `a[i]`, `*p`,
//! `parent.x`) are resolved in two phases: every index expression is
//! evaluated first, then the path is walked over the pattern data built so
//! far without further mutation.
//!
//! # Name Lookup
//!
//! The first segment of a path is looked up in the innermost scope (function
//! locals, or the members of the type being instantiated, latest first) and
//! then among the top-level patterns already placed. `parent` names the
//! members of the type enclosing the innermost one.
//!
//! Member access looks through pointers, so `p.field` reads the pointee.

use crate::interpreter::engine::{Evaluator, Scope};
use crate::interpreter::errors::EvalError;
use crate::interpreter::ops::{apply_binary, apply_unary};
use crate::memory::value::Value;
use crate::parser::ast::*;
use crate::pattern::{PatternData, PatternKind};

/// First segment of a path expression
enum Base<'e> {
    Name(&'e str),
    Parent,
    Value(Value),
}

/// Path segment with its index already evaluated
enum Step {
    Member(String),
    Index(u64),
    Deref,
}

/// What a path resolved to
pub(crate) enum Target<'s> {
    /// Members of an enclosing type (`parent`)
    Members(&'s [PatternData]),
    Pattern(&'s PatternData),
    Value(Value),
}

fn is_path(expr: &AstNode) -> bool {
    matches!(
        expr,
        AstNode::Identifier(..)
            | AstNode::Parent(_)
            | AstNode::MemberAccess { .. }
            | AstNode::ArrayAccess { .. }
            | AstNode::UnaryOp { op: UnOp::Deref, .. }
    )
}

/// Byte size of a plain value, as reported by `sizeof`
fn value_size(value: &Value) -> u64 {
    match value {
        Value::Unsigned(_, width) | Value::Signed(_, width) | Value::Float(_, width) => u64::from(*width),
        Value::Char(_) | Value::Bool(_) => 1,
        Value::String(s) => s.len() as u64,
    }
}

/// Pattern the access applies to: the pointee for pointers, the pattern itself otherwise
fn through_pointer(pattern: &PatternData) -> &PatternData {
    match (&pattern.kind, pattern.children.first()) {
        (PatternKind::Pointer, Some(pointee)) => pointee,
        _ => pattern,
    }
}

impl<'a> Evaluator<'a> {
    /// Evaluate an expression and return its value
    pub(crate) fn evaluate_expr(&mut self, expr: &AstNode) -> Result<Value, EvalError> {
        match expr {
            AstNode::Literal(value, _) => Ok(value.clone()),

            AstNode::StringLiteral(s, _) => Ok(Value::String(s.clone())),

            AstNode::CurrentOffset(_) => Ok(Value::Unsigned(u128::from(self.cursor), 8)),

            expr if is_path(expr) => {
                let location = expr.location();
                self.with_target(expr, |target| match target {
                    Target::Value(value) => Ok(value),
                    Target::Pattern(pattern) => pattern.value.clone().ok_or_else(|| {
                        EvalError::type_error(
                            "value",
                            format!("{} '{}'", pattern.kind.name(), pattern.name),
                            location,
                        )
                    }),
                    Target::Members(_) => Err(EvalError::type_error("value", "parent", location)),
                })
            }

            AstNode::ScopedName { path, location } => self.enum_constant(path, *location),

            AstNode::BinaryOp {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
                ..
            } => {
                let left = self.condition(left)?;
                let result = match op {
                    BinOp::And => left && self.condition(right)?,
                    _ => left || self.condition(right)?,
                };
                Ok(Value::Bool(result))
            }

            AstNode::BinaryOp {
                op,
                left,
                right,
                location,
            } => {
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                apply_binary(*op, &left, &right, *location)
            }

            AstNode::UnaryOp { op, operand, location } => {
                let value = self.evaluate_expr(operand)?;
                apply_unary(*op, &value, *location)
            }

            AstNode::TernaryOp {
                condition,
                true_expr,
                false_expr,
                ..
            } => {
                if self.condition(condition)? {
                    self.evaluate_expr(true_expr)
                } else {
                    self.evaluate_expr(false_expr)
                }
            }

            AstNode::FunctionCall {
                path,
                name,
                args,
                location,
            } => self.call_function(path, name, args, *location)?.ok_or_else(|| {
                EvalError::type_error("value", format!("no value returned by '{}'", path.qualify(name)), *location)
            }),

            AstNode::SizeOf { operand, location } => {
                let size = match operand {
                    SizeofOperand::Type(ty) => self.static_size(ty, &self.current_namespace(), 0)?,
                    SizeofOperand::Expr(expr) => self.size_of_expr(expr, *location)?,
                };
                Ok(Value::Unsigned(u128::from(size), 8))
            }

            AstNode::AddressOf { expr, location } => {
                let location = *location;
                let offset = self.with_target(expr, |target| match target {
                    Target::Pattern(pattern) => Ok(pattern.offset),
                    _ => Err(EvalError::type_error("pattern", "value", location)),
                })?;
                Ok(Value::Unsigned(u128::from(offset), 8))
            }

            other => Err(EvalError::type_error("expression", "statement", other.location())),
        }
    }

    /// Evaluate a condition to a boolean
    pub(crate) fn condition(&mut self, expr: &AstNode) -> Result<bool, EvalError> {
        let value = self.evaluate_expr(expr)?;
        value
            .as_bool()
            .ok_or_else(|| EvalError::type_error("boolean condition", value.kind_name(), expr.location()))
    }

    /// Evaluate a placement or read address
    pub(crate) fn evaluate_address(&mut self, expr: &AstNode) -> Result<u64, EvalError> {
        let value = self.evaluate_expr(expr)?;
        value
            .as_u64()
            .ok_or_else(|| EvalError::type_error("address", value.kind_name(), expr.location()))
    }

    fn size_of_expr(&mut self, expr: &AstNode, location: SourceLocation) -> Result<u64, EvalError> {
        let resolved = if is_path(expr) {
            self.with_target(expr, |target| {
                Ok(match target {
                    Target::Pattern(pattern) => pattern.size,
                    Target::Value(value) => value_size(&value),
                    Target::Members(members) => {
                        let start = members.iter().map(|m| m.offset).min().unwrap_or(0);
                        let end = members.iter().map(PatternData::end).max().unwrap_or(0);
                        end.saturating_sub(start)
                    }
                })
            })
        } else {
            self.evaluate_expr(expr).map(|value| value_size(&value))
        };

        // `sizeof(Name)` where `Name` is a type rather than a variable
        let type_path = match expr {
            AstNode::Identifier(name, _) => Some(vec![name.clone()]),
            AstNode::ScopedName { path, .. } => Some(path.clone()),
            _ => None,
        };
        match (resolved, type_path) {
            (Err(EvalError::UndefinedVariable { .. }), Some(path)) => {
                let ty = TypeRef {
                    endian: None,
                    kind: TypeKind::Named(path),
                    location,
                };
                self.static_size(&ty, &self.current_namespace(), 0)
            }
            (resolved, _) => resolved,
        }
    }

    // ===== Paths =====

    /// Resolve a path expression and hand the target to `f`
    pub(crate) fn with_target<T>(
        &mut self,
        expr: &AstNode,
        f: impl FnOnce(Target<'_>) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        let mut steps = Vec::new();
        let base = self.flatten_path(expr, &mut steps)?;
        let target = self.resolve_target(base, &steps, expr.location())?;
        f(target)
    }

    fn flatten_path<'e>(
        &mut self,
        expr: &'e AstNode,
        steps: &mut Vec<(Step, SourceLocation)>,
    ) -> Result<Base<'e>, EvalError> {
        let base = match expr {
            AstNode::Identifier(name, _) => Base::Name(name),
            AstNode::Parent(_) => Base::Parent,
            AstNode::MemberAccess {
                object,
                member,
                location,
            } => {
                let base = self.flatten_path(object, steps)?;
                steps.push((Step::Member(member.clone()), *location));
                base
            }
            AstNode::ArrayAccess { array, index, location } => {
                let base = self.flatten_path(array, steps)?;
                let value = self.evaluate_expr(index)?;
                let index = value
                    .as_u64()
                    .ok_or_else(|| EvalError::type_error("array index", value.kind_name(), *location))?;
                steps.push((Step::Index(index), *location));
                base
            }
            AstNode::UnaryOp {
                op: UnOp::Deref,
                operand,
                location,
            } => {
                let base = self.flatten_path(operand, steps)?;
                steps.push((Step::Deref, *location));
                base
            }
            other => Base::Value(self.evaluate_expr(other)?),
        };
        Ok(base)
    }

    fn resolve_target(
        &self,
        base: Base<'_>,
        steps: &[(Step, SourceLocation)],
        location: SourceLocation,
    ) -> Result<Target<'_>, EvalError> {
        let mut target = match base {
            Base::Name(name) => self
                .lookup_variable(name)
                .ok_or_else(|| EvalError::UndefinedVariable {
                    name: name.to_string(),
                    location,
                })?,
            Base::Parent => self
                .parent_members()
                .map(Target::Members)
                .ok_or_else(|| EvalError::UndefinedVariable {
                    name: "parent".to_string(),
                    location,
                })?,
            Base::Value(value) => Target::Value(value),
        };

        for (step, location) in steps {
            target = self.apply_step(target, step, *location)?;
        }
        Ok(target)
    }

    fn apply_step<'s>(&'s self, target: Target<'s>, step: &Step, location: SourceLocation) -> Result<Target<'s>, EvalError> {
        let undefined = |name: &str| EvalError::UndefinedVariable {
            name: name.to_string(),
            location,
        };
        let out_of_bounds = |index: u64| EvalError::aborted(format!("index {} is out of bounds", index), location);

        match (step, target) {
            (Step::Member(name), Target::Members(members)) => members
                .iter()
                .rev()
                .find(|m| m.name == *name)
                .map(Target::Pattern)
                .ok_or_else(|| undefined(name)),

            (Step::Member(name), Target::Pattern(pattern)) => through_pointer(pattern)
                .child(name)
                .map(Target::Pattern)
                .ok_or_else(|| undefined(name)),

            (Step::Index(index), Target::Pattern(pattern)) => match pattern.kind {
                PatternKind::Array => usize::try_from(*index)
                    .ok()
                    .and_then(|i| pattern.children.get(i))
                    .map(Target::Pattern)
                    .ok_or_else(|| out_of_bounds(*index)),
                PatternKind::String => {
                    if *index >= pattern.size {
                        return Err(out_of_bounds(*index));
                    }
                    let byte = self.read_bytes(pattern.offset + index, 1, location)?;
                    Ok(Target::Value(Value::Char(byte[0])))
                }
                _ => Err(EvalError::type_error("array", pattern.kind.name(), location)),
            },

            (Step::Index(index), Target::Value(Value::String(s))) => usize::try_from(*index)
                .ok()
                .and_then(|i| s.as_bytes().get(i))
                .map(|c| Target::Value(Value::Char(*c)))
                .ok_or_else(|| out_of_bounds(*index)),

            (Step::Deref, Target::Pattern(pattern)) if pattern.kind == PatternKind::Pointer => pattern
                .children
                .first()
                .map(Target::Pattern)
                .ok_or_else(|| EvalError::aborted(format!("dereferencing null pointer '{}'", pattern.name), location)),

            (Step::Deref, Target::Pattern(pattern)) => Err(EvalError::type_error("pointer", pattern.kind.name(), location)),

            (Step::Member(name), _) => Err(EvalError::type_error(
                format!("pattern with member '{}'", name),
                "value",
                location,
            )),
            (Step::Index(_), _) => Err(EvalError::type_error("array", "value", location)),
            (Step::Deref, _) => Err(EvalError::type_error("pointer", "value", location)),
        }
    }

    /// Innermost binding of `name`, then the top-level patterns
    fn lookup_variable(&self, name: &str) -> Option<Target<'_>> {
        match self.scopes.last() {
            Some(Scope::Function { locals }) => {
                if let Some(local) = locals.get(name) {
                    return Some(Target::Value(local.value.clone()));
                }
            }
            Some(Scope::Type { members, .. }) => {
                if let Some(member) = members.iter().rev().find(|m| m.name == name) {
                    return Some(Target::Pattern(member));
                }
            }
            None => {}
        }
        self.results.iter().rev().find(|p| p.name == name).map(Target::Pattern)
    }

    /// Members of the type enclosing the innermost type being instantiated
    fn parent_members(&self) -> Option<&[PatternData]> {
        self.scopes
            .iter()
            .rev()
            .filter_map(|scope| match scope {
                Scope::Type { members, .. } => Some(members.as_slice()),
                Scope::Function { .. } => None,
            })
            .nth(1)
    }

    /// `Enum::Entry`, converted to the enum's underlying type
    fn enum_constant(&mut self, path: &[String], location: SourceLocation) -> Result<Value, EvalError> {
        let undefined = || EvalError::UndefinedVariable {
            name: path.join("::"),
            location,
        };

        let (entry, type_path) = path.split_last().ok_or_else(undefined)?;
        let Some((namespace, AstNode::EnumDef { underlying, entries, .. })) = self.lookup_type(type_path) else {
            return Err(undefined());
        };
        let TypeKind::Builtin(ty) = underlying.kind else {
            return Err(EvalError::type_error("integral enum type", underlying.display_name(), location));
        };

        self.namespaces.push(namespace);
        let values = self.enum_values(entries, ty);
        self.namespaces.pop();

        values?
            .into_iter()
            .find(|(name, _)| name == entry)
            .map(|(_, value)| value)
            .ok_or_else(undefined)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RuntimeConfig;
    use crate::interpreter::engine::Evaluator;
    use crate::interpreter::errors::EvalError;
    use crate::interpreter::functions::FunctionRegistry;
    use crate::memory::data_source::MemoryDataSource;
    use crate::memory::value::Value;
    use crate::parser::Parser;
    use crate::pattern::PatternData;

    fn run(source: &str, data: Vec<u8>) -> Result<Vec<PatternData>, EvalError> {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let data = MemoryDataSource::new(data);
        let registry = FunctionRegistry::with_std();
        let mut evaluator = Evaluator::new(&data, &registry, RuntimeConfig::default());
        evaluator.evaluate(&program.nodes)
    }

    #[test]
    fn test_member_expressions_drive_layout() {
        let source = "struct Blob { u8 count; u8 items[count]; };\nBlob blob @ 0;";
        let patterns = run(source, vec![3, 10, 20, 30, 40]).unwrap();
        let items = patterns[0].child("items").unwrap();
        assert_eq!(items.children.len(), 3);
        assert_eq!(items.children[2].value, Some(Value::Unsigned(30, 1)));
        assert_eq!(patterns[0].size, 4);
    }

    #[test]
    fn test_parent_access() {
        let source = "struct Inner { u8 data[parent.len]; };\n\
                      struct Outer { u8 len; Inner inner; };\n\
                      Outer outer @ 0;";
        let patterns = run(source, vec![2, 0xAA, 0xBB, 0xCC]).unwrap();
        let inner = patterns[0].child("inner").unwrap();
        assert_eq!(inner.size, 2);
        assert_eq!(inner.offset, 1);
    }

    #[test]
    fn test_top_level_patterns_are_visible() {
        let source = "u8 size @ 0;\nu8 body[size] @ 1;\nstd::assert(body[1] == 0x22, \"second byte\");";
        assert!(run(source, vec![2, 0x11, 0x22]).is_ok());
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        let source = "std::assert(1 || std::mem::read_unsigned(100, 1), \"or\");\n\
                      std::assert(!(0 && std::mem::read_unsigned(100, 1)), \"and\");";
        assert!(run(source, vec![0]).is_ok());
    }

    #[test]
    fn test_enum_constants() {
        let source = "enum Kind : u8 { A, B = 5, C };\nstd::assert(Kind::C == 6, \"C\");\nstd::assert(Kind::A == 0, \"A\");";
        assert!(run(source, vec![]).is_ok());
    }

    #[test]
    fn test_sizeof_and_addressof() {
        let source = "struct Pair { u16 a; u16 b; };\nPair pair @ 2;\n\
                      std::assert(sizeof(pair) == 4, \"sizeof pattern\");\n\
                      std::assert(sizeof(Pair) == 4, \"sizeof type\");\n\
                      std::assert(sizeof(u64) == 8, \"sizeof builtin\");\n\
                      std::assert(addressof(pair.b) == 4, \"addressof\");";
        assert!(run(source, vec![0; 6]).is_ok());
    }

    #[test]
    fn test_string_indexing() {
        let source = "char name[4] @ 0;\nstd::assert(name[1] == 'B', \"index\");\nstd::assert(\"xyz\"[2] == 'z', \"literal\");";
        assert!(run(source, b"ABCD".to_vec()).is_ok());
    }

    #[test]
    fn test_index_out_of_bounds() {
        let err = run("u8 bytes[2] @ 0;\nstd::print(bytes[2]);", vec![1, 2]).unwrap_err();
        assert_eq!(err.to_string(), "index 2 is out of bounds");
    }

    #[test]
    fn test_undefined_variable() {
        let err = run("std::print(nothing);", vec![]).unwrap_err();
        assert!(matches!(err, EvalError::UndefinedVariable { ref name, .. } if name == "nothing"));
    }

    #[test]
    fn test_void_call_used_as_value() {
        let err = run("fn f() { }\nu8 x[f()] @ 0;", vec![0]).unwrap_err();
        assert!(matches!(err, EvalError::TypeError { .. }));
    }
}
