//! Semantic validation
//!
//! A scope-aware walk over the parsed program that runs before evaluation and
//! never touches the data source. It checks:
//!
//! - type and function names are unique per namespace, top-level placements
//!   are unique, and sibling members of a type are unique (the two branches of
//!   an `if` may declare the same name)
//! - every type reference resolves and `using` aliases are not cyclic
//! - bitfield widths and enum entry values fold to constants; literal array
//!   sizes are not negative
//! - enum underlying types are integral built-ins and pointer size types are
//!   unsigned built-ins
//! - every call names a user function or a registered builtin, with a
//!   matching argument count
//! - `return`, assignments, `while` and initializers only appear in functions,
//!   whose locals have built-in types
//!
//! The first violation is reported at the line of the offending node.

use crate::interpreter::engine::{resolve_in, Declarations};
use crate::interpreter::functions::FunctionRegistry;
use crate::interpreter::ops::fold_constant;
use crate::parser::ast::*;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation error at line {}: {message}", location.line)]
pub struct ValidationError {
    pub message: String,
    pub location: SourceLocation,
}

fn error<T>(message: impl Into<String>, location: SourceLocation) -> Result<T, ValidationError> {
    Err(ValidationError {
        message: message.into(),
        location,
    })
}

/// Where a statement appears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopLevel,
    TypeBody,
    Function,
}

pub struct Validator<'r> {
    registry: &'r FunctionRegistry,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Validator { registry }
    }

    pub fn validate(&self, nodes: &[AstNode]) -> Result<(), ValidationError> {
        let mut pass = Pass {
            registry: self.registry,
            types: FxHashMap::default(),
            functions: FxHashMap::default(),
        };
        pass.collect(nodes, &NamespacePath::root())?;
        pass.check_declarations(nodes, &NamespacePath::root())?;

        let mut placed = FxHashSet::default();
        pass.check_statements(nodes, &NamespacePath::root(), Context::TopLevel, &mut placed)?;

        tracing::debug!(
            types = pass.types.len(),
            functions = pass.functions.len(),
            "program validated"
        );
        Ok(())
    }
}

struct Pass<'r, 'n> {
    registry: &'r FunctionRegistry,
    types: Declarations<'n>,
    functions: Declarations<'n>,
}

impl<'r, 'n> Pass<'r, 'n> {
    /// Fill the type and function tables, rejecting redefinitions
    fn collect(&mut self, nodes: &'n [AstNode], namespace: &NamespacePath) -> Result<(), ValidationError> {
        for node in nodes {
            match node {
                AstNode::Namespace { path, body, .. } => self.collect(body, &namespace.join(path))?,
                AstNode::FunctionDef { name, location, .. } => {
                    let key = namespace.qualify(name);
                    if self.functions.contains_key(&key) {
                        return error(format!("redefinition of function '{}'", key), *location);
                    }
                    self.functions.insert(key, (namespace.clone(), node));
                }
                node => {
                    if let Some(name) = node.type_name() {
                        let key = namespace.qualify(name);
                        if self.types.contains_key(&key) {
                            return error(format!("redefinition of type '{}'", key), node.location());
                        }
                        self.types.insert(key, (namespace.clone(), node));
                    }
                }
            }
        }
        Ok(())
    }

    /// Check every type and function definition
    fn check_declarations(&self, nodes: &[AstNode], namespace: &NamespacePath) -> Result<(), ValidationError> {
        for node in nodes {
            match node {
                AstNode::Namespace { path, body, .. } => self.check_declarations(body, &namespace.join(path))?,

                AstNode::StructDef { members, .. } | AstNode::UnionDef { members, .. } => {
                    self.check_statements(members, namespace, Context::TypeBody, &mut FxHashSet::default())?;
                }

                AstNode::EnumDef {
                    underlying,
                    entries,
                    location,
                    ..
                } => {
                    match underlying.kind {
                        TypeKind::Builtin(ty) if ty.is_integral() => {}
                        _ => {
                            return error(
                                format!("'{}' is not an integral type", underlying.display_name()),
                                *location,
                            )
                        }
                    }
                    let mut names = FxHashSet::default();
                    for entry in entries {
                        if !names.insert(entry.name.as_str()) {
                            return error(format!("redefinition of enum entry '{}'", entry.name), entry.location);
                        }
                        if let Some(value) = &entry.value {
                            let constant = fold_constant(value).and_then(|v| v.as_i128().or_else(|| v.as_u128().map(|u| u as i128)));
                            if constant.is_none() {
                                return error(
                                    format!("value of enum entry '{}' is not a constant integer", entry.name),
                                    entry.location,
                                );
                            }
                        }
                    }
                }

                AstNode::BitfieldDef { fields, .. } => {
                    let mut names = FxHashSet::default();
                    for field in fields {
                        if let Some(name) = &field.name {
                            if !names.insert(name.as_str()) {
                                return error(format!("redefinition of bitfield field '{}'", name), field.location);
                            }
                        }
                        let width = fold_constant(&field.width).and_then(|w| w.as_u64());
                        if !width.is_some_and(|w| (1..=128).contains(&w)) {
                            return error("bitfield width must be a constant between 1 and 128", field.location);
                        }
                    }
                }

                AstNode::Using { name, target, location } => {
                    self.check_type(target, namespace)?;
                    self.check_alias_cycle(name, target, namespace, *location)?;
                }

                AstNode::FunctionDef {
                    params, body, location, ..
                } => {
                    let mut names = FxHashSet::default();
                    for param in params {
                        if !names.insert(param.as_str()) {
                            return error(format!("duplicate parameter '{}'", param), *location);
                        }
                    }
                    self.check_statements(body, namespace, Context::Function, &mut FxHashSet::default())?;
                }

                _ => {}
            }
        }
        Ok(())
    }

    fn check_alias_cycle(
        &self,
        name: &str,
        target: &TypeRef,
        namespace: &NamespacePath,
        location: SourceLocation,
    ) -> Result<(), ValidationError> {
        let mut seen = FxHashSet::default();
        seen.insert(namespace.qualify(name));

        let mut current = (namespace.clone(), target);
        while let TypeKind::Named(path) = &current.1.kind {
            let Some((ns, AstNode::Using { name: alias, target, .. })) = resolve_in(&self.types, &current.0, path) else {
                break;
            };
            if !seen.insert(ns.qualify(alias)) {
                return error(format!("type alias '{}' refers to itself", namespace.qualify(name)), location);
            }
            current = (ns, target);
        }
        Ok(())
    }

    fn check_type(&self, ty: &TypeRef, namespace: &NamespacePath) -> Result<(), ValidationError> {
        if let TypeKind::Named(path) = &ty.kind {
            if resolve_in(&self.types, namespace, path).is_none() {
                return error(format!("undefined type '{}'", path.join("::")), ty.location);
            }
        }
        Ok(())
    }

    /// Check a statement list. `names` holds the names already declared in
    /// the enclosing scope and receives the names declared here.
    fn check_statements(
        &self,
        statements: &[AstNode],
        namespace: &NamespacePath,
        context: Context,
        names: &mut FxHashSet<String>,
    ) -> Result<(), ValidationError> {
        for statement in statements {
            self.check_statement(statement, namespace, context, names)?;
        }
        Ok(())
    }

    fn check_statement(
        &self,
        statement: &AstNode,
        namespace: &NamespacePath,
        context: Context,
        names: &mut FxHashSet<String>,
    ) -> Result<(), ValidationError> {
        let outside_function = |what: &str, location| error(format!("{} is only allowed inside functions", what), location);

        match statement {
            AstNode::Namespace { path, body, .. } if context == Context::TopLevel => {
                self.check_statements(body, &namespace.join(path), context, names)
            }

            AstNode::VarDecl {
                name,
                var_type,
                placement,
                init,
                location,
            } => {
                self.check_type(var_type, namespace)?;
                if let Some(placement) = placement {
                    self.check_expr(placement, namespace)?;
                }
                match (context, init) {
                    (Context::Function, _) => {
                        if !matches!(var_type.kind, TypeKind::Builtin(ty) if ty != BuiltinType::Padding) {
                            return error(
                                format!("local '{}' must have a built-in type", name),
                                *location,
                            );
                        }
                        if let Some(init) = init {
                            self.check_expr(init, namespace)?;
                        }
                        Ok(())
                    }
                    (_, Some(_)) => outside_function("an initializer", *location),
                    (_, None) => self.declare(name, *location, names),
                }
            }

            AstNode::ArrayDecl {
                name,
                elem_type,
                size,
                placement,
                location,
            } => {
                if context == Context::Function {
                    return error(format!("local '{}' must have a built-in type", name), *location);
                }
                self.check_type(elem_type, namespace)?;
                match size {
                    ArraySize::Fixed(count) => {
                        if let Some(count) = fold_constant(count) {
                            if count.as_u128().is_none() {
                                return error(format!("size of array '{}' must not be negative", name), *location);
                            }
                        }
                        self.check_expr(count, namespace)?;
                    }
                    ArraySize::While(condition) => self.check_expr(condition, namespace)?,
                    ArraySize::Unsized => {
                        if matches!(elem_type.kind, TypeKind::Builtin(BuiltinType::Padding)) {
                            return error("padding needs an explicit size", *location);
                        }
                    }
                }
                if let Some(placement) = placement {
                    self.check_expr(placement, namespace)?;
                }
                self.declare(name, *location, names)
            }

            AstNode::PointerDecl {
                name,
                pointee,
                size_type,
                placement,
                location,
            } => {
                if context == Context::Function {
                    return error(format!("local '{}' must have a built-in type", name), *location);
                }
                self.check_type(pointee, namespace)?;
                if !matches!(size_type.kind, TypeKind::Builtin(BuiltinType::Unsigned(_))) {
                    return error(
                        format!("pointer size type '{}' must be an unsigned integer", size_type.display_name()),
                        size_type.location,
                    );
                }
                if let Some(placement) = placement {
                    self.check_expr(placement, namespace)?;
                }
                self.declare(name, *location, names)
            }

            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_expr(condition, namespace)?;

                // Branches are exclusive: each sees the names declared so far
                let mut then_names = names.clone();
                self.check_statements(then_branch, namespace, context, &mut then_names)?;
                let mut else_names = names.clone();
                if let Some(else_branch) = else_branch {
                    self.check_statements(else_branch, namespace, context, &mut else_names)?;
                }
                names.extend(then_names);
                names.extend(else_names);
                Ok(())
            }

            AstNode::While { condition, body, location } => {
                if context != Context::Function {
                    return outside_function("'while'", *location);
                }
                self.check_expr(condition, namespace)?;
                self.check_statements(body, namespace, context, names)
            }

            AstNode::Return { expr, location } => {
                if context != Context::Function {
                    return outside_function("'return'", *location);
                }
                match expr {
                    Some(expr) => self.check_expr(expr, namespace),
                    None => Ok(()),
                }
            }

            AstNode::Assignment { rhs, location, .. } => {
                if context != Context::Function {
                    return outside_function("assignment", *location);
                }
                self.check_expr(rhs, namespace)
            }

            AstNode::ExpressionStatement { expr, .. } => self.check_expr(expr, namespace),

            _ => Ok(()),
        }
    }

    fn declare(&self, name: &str, location: SourceLocation, names: &mut FxHashSet<String>) -> Result<(), ValidationError> {
        if name == "padding" {
            return Ok(());
        }
        if !names.insert(name.to_string()) {
            return error(format!("redefinition of '{}'", name), location);
        }
        Ok(())
    }

    /// Resolve calls and `sizeof` types inside an expression
    fn check_expr(&self, expr: &AstNode, namespace: &NamespacePath) -> Result<(), ValidationError> {
        match expr {
            AstNode::FunctionCall {
                path,
                name,
                args,
                location,
            } => {
                for arg in args {
                    self.check_expr(arg, namespace)?;
                }
                self.check_call(path, name, args.len(), namespace, *location)
            }
            AstNode::SizeOf { operand, .. } => match operand {
                SizeofOperand::Type(ty) => self.check_type(ty, namespace),
                SizeofOperand::Expr(expr) => self.check_expr(expr, namespace),
            },
            AstNode::AddressOf { expr, .. } => self.check_expr(expr, namespace),
            AstNode::MemberAccess { object, .. } => self.check_expr(object, namespace),
            AstNode::ArrayAccess { array, index, .. } => {
                self.check_expr(array, namespace)?;
                self.check_expr(index, namespace)
            }
            AstNode::BinaryOp { left, right, .. } => {
                self.check_expr(left, namespace)?;
                self.check_expr(right, namespace)
            }
            AstNode::UnaryOp { operand, .. } => self.check_expr(operand, namespace),
            AstNode::TernaryOp {
                condition,
                true_expr,
                false_expr,
                ..
            } => {
                self.check_expr(condition, namespace)?;
                self.check_expr(true_expr, namespace)?;
                self.check_expr(false_expr, namespace)
            }
            _ => Ok(()),
        }
    }

    fn check_call(
        &self,
        path: &NamespacePath,
        name: &str,
        arg_count: usize,
        namespace: &NamespacePath,
        location: SourceLocation,
    ) -> Result<(), ValidationError> {
        let mut full_path = path.segments().to_vec();
        full_path.push(name.to_string());

        if let Some((_, AstNode::FunctionDef { params, .. })) = resolve_in(&self.functions, namespace, &full_path) {
            if params.len() != arg_count {
                return error(
                    format!(
                        "wrong argument count for function '{}': expected {}, got {}",
                        path.qualify(name),
                        params.len(),
                        arg_count
                    ),
                    location,
                );
            }
            return Ok(());
        }

        match self.registry.resolve(path, name) {
            Some(entry) if !entry.arity.accepts(arg_count) => error(
                format!(
                    "wrong argument count for function '{}': expected {}, got {}",
                    path.qualify(name),
                    entry.arity,
                    arg_count
                ),
                location,
            ),
            Some(_) => Ok(()),
            None => error(format!("call to undefined function '{}'", path.qualify(name)), location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn validate(source: &str) -> Result<(), ValidationError> {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let registry = FunctionRegistry::with_std();
        Validator::new(&registry).validate(&program.nodes)
    }

    fn message(source: &str) -> String {
        validate(source).unwrap_err().message
    }

    #[test]
    fn test_valid_program() {
        let source = "namespace fmt { struct Header { u32 magic; u8 len; char name[len]; }; }\n\
                      enum Kind : u16 { A, B = 1 << 4 };\n\
                      bitfield Flags { a : 3; padding : 5; };\n\
                      fn check(x) { u32 y = x; while (y > 0) { y = y - 1; } return y; }\n\
                      fmt::Header header @ 0;\n\
                      std::assert(check(3) == 0, \"ok\");";
        assert_eq!(validate(source), Ok(()));
    }

    #[test]
    fn test_duplicate_types() {
        assert_eq!(message("struct A { u8 x; };\nstruct A { u8 y; };"), "redefinition of type 'A'");
        // Same name in different namespaces is fine
        assert!(validate("namespace a { struct T { u8 x; }; }\nnamespace b { struct T { u8 x; }; }").is_ok());
    }

    #[test]
    fn test_duplicate_members_and_branches() {
        assert_eq!(message("struct A { u8 x; u16 x; };"), "redefinition of 'x'");
        assert!(validate("struct A { u8 t; if (t == 1) { u8 v; } else { u16 v; } };").is_ok());
        assert!(validate("struct A { padding[1]; padding[2]; };").is_ok());
        assert_eq!(message("u8 a @ 0;\nu8 a @ 1;"), "redefinition of 'a'");
    }

    #[test]
    fn test_undefined_type_reports_line() {
        let err = validate("struct A { u8 x; };\n\nMissing m @ 0;").unwrap_err();
        assert_eq!(err.message, "undefined type 'Missing'");
        assert_eq!(err.location.line, 3);
    }

    #[test]
    fn test_alias_cycle() {
        assert_eq!(message("using A = B;\nusing B = A;"), "type alias 'A' refers to itself");
    }

    #[test]
    fn test_constant_requirements() {
        assert_eq!(
            message("bitfield F { a : 0; };"),
            "bitfield width must be a constant between 1 and 128"
        );
        assert_eq!(
            message("u8 n @ 0;\nbitfield F { a : n; };"),
            "bitfield width must be a constant between 1 and 128"
        );
        assert_eq!(message("u8 data[-1] @ 0;"), "size of array 'data' must not be negative");
        assert_eq!(message("enum E : float { A };"), "'float' is not an integral type");
    }

    #[test]
    fn test_calls_must_resolve() {
        assert_eq!(message("nope();"), "call to undefined function 'nope'");
        assert_eq!(
            message("std::str::length(\"a\", \"b\");"),
            "wrong argument count for function 'std::str::length': expected 1, got 2"
        );
    }

    #[test]
    fn test_function_only_statements() {
        assert_eq!(message("struct A { u8 x = 1; };"), "an initializer is only allowed inside functions");
        assert_eq!(message("fn f() { Header h; }"), "undefined type 'Header'");
        assert_eq!(message("struct H { u8 x; };\nfn f() { H h; }"), "local 'h' must have a built-in type");
        assert_eq!(message("fn f(a, a) { }"), "duplicate parameter 'a'");
    }
}
