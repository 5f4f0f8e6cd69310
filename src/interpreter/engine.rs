// Execution engine for the pattern language

use crate::config::RuntimeConfig;
use crate::console::{LogConsole, LogLevel};
use crate::interpreter::errors::EvalError;
use crate::interpreter::functions::{CallContext, FunctionRegistry};
use crate::memory::data_source::{DataSource, DataSourceError};
use crate::memory::value::Value;
use crate::memory::{decode_builtin, sizeof_builtin, Endian};
use crate::parser::ast::*;
use crate::pattern::{Palette, PatternData};
use rustc_hash::FxHashMap;

/// How a statement finished
pub(crate) enum Flow {
    Normal,
    Return(Option<Value>),
}

/// Function local; parameters are untyped and keep whatever they were passed
pub(crate) struct Local {
    pub ty: Option<BuiltinType>,
    pub value: Value,
}

/// One level of the scope stack
pub(crate) enum Scope {
    /// Locals of a user function call
    Function { locals: FxHashMap<String, Local> },
    /// Members of a struct or union being instantiated
    Type {
        members: Vec<PatternData>,
        start: u64,
        is_union: bool,
    },
}

/// Declarations by fully qualified name, with the namespace they were declared in
pub(crate) type Declarations<'a> = FxHashMap<String, (NamespacePath, &'a AstNode)>;

/// Look `path` up from namespace `from`, trying `from` and then each ancestor
pub(crate) fn resolve_in<'a>(
    table: &Declarations<'a>,
    from: &NamespacePath,
    path: &[String],
) -> Option<(NamespacePath, &'a AstNode)> {
    let (name, prefix) = path.split_last()?;
    from.ancestors()
        .find_map(|ns| table.get(&ns.join(prefix).qualify(name)))
        .map(|(ns, node)| (ns.clone(), *node))
}

/// Tree-walking evaluator producing pattern data from a parsed program
pub struct Evaluator<'a> {
    pub(crate) source: &'a dyn DataSource,
    pub(crate) registry: &'a FunctionRegistry,
    pub(crate) config: RuntimeConfig,

    /// Struct, union, enum, bitfield and alias declarations
    pub(crate) types: Declarations<'a>,
    pub(crate) functions: Declarations<'a>,

    pub(crate) scopes: Vec<Scope>,
    pub(crate) namespaces: Vec<NamespacePath>,

    /// Address the next unplaced declaration starts at (`$`)
    pub(crate) cursor: u64,
    /// Byte order inherited by declarations without a `be`/`le` prefix
    pub(crate) endian: Endian,
    /// Nesting of function calls and type instantiations
    pub(crate) depth: u32,

    pub(crate) console: LogConsole,
    pub(crate) palette: Palette,
    pub(crate) results: Vec<PatternData>,
}

impl<'a> Evaluator<'a> {
    pub fn new(source: &'a dyn DataSource, registry: &'a FunctionRegistry, config: RuntimeConfig) -> Self {
        Evaluator {
            source,
            registry,
            endian: config.default_endian,
            config,
            types: FxHashMap::default(),
            functions: FxHashMap::default(),
            scopes: Vec::new(),
            namespaces: Vec::new(),
            cursor: 0,
            depth: 0,
            console: LogConsole::new(),
            palette: Palette::new(),
            results: Vec::new(),
        }
    }

    /// Run `program` from its first top-level declaration.
    ///
    /// On abort the error is also logged to the console and no pattern data is returned.
    pub fn evaluate(&mut self, program: &'a [AstNode]) -> Result<Vec<PatternData>, EvalError> {
        self.reset();
        self.collect_declarations(program, &NamespacePath::root());
        tracing::debug!(
            types = self.types.len(),
            functions = self.functions.len(),
            endian = %self.endian,
            "evaluating program"
        );

        match self.execute_top_level(program) {
            Ok(()) => Ok(std::mem::take(&mut self.results)),
            Err(err) => {
                tracing::debug!(line = err.location().line, %err, "evaluation aborted");
                self.console.log(LogLevel::Error, err.to_string());
                self.results.clear();
                Err(err)
            }
        }
    }

    pub fn console(&self) -> &LogConsole {
        &self.console
    }

    pub fn into_console(self) -> LogConsole {
        self.console
    }

    fn reset(&mut self) {
        self.types.clear();
        self.functions.clear();
        self.scopes.clear();
        self.namespaces.clear();
        self.cursor = 0;
        self.endian = self.config.default_endian;
        self.depth = 0;
        self.console.clear();
        self.palette.reset();
        self.results.clear();
    }

    fn collect_declarations(&mut self, nodes: &'a [AstNode], namespace: &NamespacePath) {
        for node in nodes {
            match node {
                AstNode::Namespace { path, body, .. } => {
                    self.collect_declarations(body, &namespace.join(path));
                }
                AstNode::FunctionDef { name, .. } => {
                    self.functions
                        .entry(namespace.qualify(name))
                        .or_insert_with(|| (namespace.clone(), node));
                }
                _ => {
                    if let Some(name) = node.type_name() {
                        self.types
                            .entry(namespace.qualify(name))
                            .or_insert_with(|| (namespace.clone(), node));
                    }
                }
            }
        }
    }

    fn execute_top_level(&mut self, nodes: &'a [AstNode]) -> Result<(), EvalError> {
        for node in nodes {
            match node {
                AstNode::Namespace { path, body, .. } => {
                    let namespace = self.current_namespace().join(path);
                    self.namespaces.push(namespace);
                    let result = self.execute_top_level(body);
                    self.namespaces.pop();
                    result?;
                }
                AstNode::FunctionDef { .. } => {}
                node if node.type_name().is_some() => {}
                node => {
                    self.execute_statement(node)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn current_namespace(&self) -> NamespacePath {
        self.namespaces.last().cloned().unwrap_or_default()
    }

    pub(crate) fn lookup_type(&self, path: &[String]) -> Option<(NamespacePath, &'a AstNode)> {
        resolve_in(&self.types, &self.current_namespace(), path)
    }

    pub(crate) fn enter_depth(&mut self, location: SourceLocation) -> Result<(), EvalError> {
        if self.depth >= self.config.recursion_limit {
            return Err(EvalError::RecursionLimit {
                limit: self.config.recursion_limit,
                location,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ===== Data source access =====

    /// Fail unless `[offset, offset + size)` lies inside the source's actual data
    pub(crate) fn check_range(&self, offset: u64, size: u64, location: SourceLocation) -> Result<(), EvalError> {
        if !self.source.is_available() {
            return Err(EvalError::SourceUnavailable { location });
        }
        match offset.checked_add(size) {
            Some(end) if end <= self.source.actual_size() => Ok(()),
            _ => Err(EvalError::ReadOutOfRange {
                address: offset,
                size,
                location,
            }),
        }
    }

    pub(crate) fn read_bytes(&self, offset: u64, size: u64, location: SourceLocation) -> Result<Vec<u8>, EvalError> {
        self.check_range(offset, size, location)?;

        let mut buffer = vec![0u8; size as usize];
        self.source.read(offset, &mut buffer).map_err(|err| match err {
            DataSourceError::Unavailable => EvalError::SourceUnavailable { location },
            DataSourceError::OutOfRange { .. } => EvalError::ReadOutOfRange {
                address: offset,
                size,
                location,
            },
        })?;
        Ok(buffer)
    }

    // ===== Statements =====

    pub(crate) fn execute_block(&mut self, statements: &[AstNode]) -> Result<Flow, EvalError> {
        for statement in statements {
            if let Flow::Return(value) = self.execute_statement(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn execute_statement(&mut self, statement: &AstNode) -> Result<Flow, EvalError> {
        match statement {
            AstNode::VarDecl { .. } if self.in_function() => self.declare_local(statement)?,
            AstNode::VarDecl { .. } | AstNode::ArrayDecl { .. } | AstNode::PointerDecl { .. } => {
                let pattern = self.place_declaration(statement)?;
                self.store_pattern(pattern);
            }

            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.condition(condition)? {
                    return self.execute_block(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute_block(else_branch);
                }
            }

            AstNode::While { condition, body, .. } => {
                while self.condition(condition)? {
                    if let Flow::Return(value) = self.execute_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            AstNode::Return { expr, .. } => {
                let value = match expr {
                    Some(expr) => Some(self.evaluate_expr(expr)?),
                    None => None,
                };
                return Ok(Flow::Return(value));
            }

            AstNode::Assignment { name, rhs, location } => {
                let value = self.evaluate_expr(rhs)?;
                self.assign(name, value, *location)?;
            }

            AstNode::ExpressionStatement { expr, .. } => match expr.as_ref() {
                AstNode::FunctionCall {
                    path,
                    name,
                    args,
                    location,
                } => {
                    self.call_function(path, name, args, *location)?;
                }
                expr => {
                    self.evaluate_expr(expr)?;
                }
            },

            // Declarations were collected before the run
            _ => {}
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn in_function(&self) -> bool {
        matches!(self.scopes.last(), Some(Scope::Function { .. }))
    }

    fn store_pattern(&mut self, pattern: PatternData) {
        match self.scopes.last_mut() {
            Some(Scope::Type { members, .. }) => members.push(pattern),
            _ => self.results.push(pattern),
        }
    }

    /// `T name [@ addr] [= init];` inside a function body
    fn declare_local(&mut self, declaration: &AstNode) -> Result<(), EvalError> {
        let AstNode::VarDecl {
            name,
            var_type,
            placement,
            init,
            location,
        } = declaration
        else {
            return Ok(());
        };

        let TypeKind::Builtin(ty) = var_type.kind else {
            return Err(EvalError::type_error(
                "built-in local type",
                var_type.display_name(),
                *location,
            ));
        };

        let value = match (placement, init) {
            (Some(address), _) => {
                let address = self.evaluate_address(address)?;
                let bytes = self.read_bytes(address, sizeof_builtin(ty), *location)?;
                let endian = var_type.endian.unwrap_or(self.endian);
                decode_builtin(ty, &bytes, endian)
            }
            (None, Some(init)) => {
                let value = self.evaluate_expr(init)?;
                let cast = value
                    .cast_to(ty)
                    .ok_or_else(|| EvalError::type_error(ty.name(), value.kind_name(), init.location()))?;
                Some(cast)
            }
            (None, None) => Value::Unsigned(0, 1).cast_to(ty),
        }
        .ok_or_else(|| EvalError::type_error("value type", ty.name(), *location))?;

        if let Some(Scope::Function { locals }) = self.scopes.last_mut() {
            locals.insert(name.clone(), Local { ty: Some(ty), value });
        }
        Ok(())
    }

    fn assign(&mut self, name: &str, value: Value, location: SourceLocation) -> Result<(), EvalError> {
        let local = match self.scopes.last_mut() {
            Some(Scope::Function { locals }) => locals.get_mut(name),
            _ => None,
        }
        .ok_or_else(|| EvalError::UndefinedVariable {
            name: name.to_string(),
            location,
        })?;

        local.value = match local.ty {
            Some(ty) => value
                .cast_to(ty)
                .ok_or_else(|| EvalError::type_error(ty.name(), value.kind_name(), location))?,
            None => value,
        };
        Ok(())
    }

    // ===== Function calls =====

    /// Call a user function or builtin. User functions declared in the current
    /// namespace or one of its ancestors take precedence over builtins.
    pub(crate) fn call_function(
        &mut self,
        path: &NamespacePath,
        name: &str,
        args: &[AstNode],
        location: SourceLocation,
    ) -> Result<Option<Value>, EvalError> {
        let mut full_path = path.segments().to_vec();
        full_path.push(name.to_string());

        if let Some((namespace, AstNode::FunctionDef { params, body, .. })) =
            resolve_in(&self.functions, &self.current_namespace(), &full_path)
        {
            let qualified = namespace.qualify(name);
            return self.call_user_function(&qualified, namespace, params, body, args, location);
        }

        let qualified = path.qualify(name);
        let registry = self.registry;
        let entry = registry
            .resolve(path, name)
            .ok_or_else(|| EvalError::UndefinedFunction {
                name: qualified.clone(),
                location,
            })?;

        let values = args
            .iter()
            .map(|arg| self.evaluate_expr(arg))
            .collect::<Result<Vec<_>, _>>()?;
        entry.check_arguments(&qualified, &values, location)?;

        tracing::trace!(function = %qualified, args = values.len(), "calling builtin");
        let mut context = CallContext {
            source: self.source,
            console: &mut self.console,
            endian: self.config.default_endian,
        };
        (entry.implementation)(&mut context, &values).map_err(|err| err.or_at(location))
    }

    fn call_user_function(
        &mut self,
        qualified: &str,
        namespace: NamespacePath,
        params: &[String],
        body: &[AstNode],
        args: &[AstNode],
        location: SourceLocation,
    ) -> Result<Option<Value>, EvalError> {
        if params.len() != args.len() {
            return Err(EvalError::ArgumentCount {
                function: qualified.to_string(),
                expected: params.len().to_string(),
                got: args.len(),
                location,
            });
        }

        // Arguments see the caller's scope
        let values = args
            .iter()
            .map(|arg| self.evaluate_expr(arg))
            .collect::<Result<Vec<_>, _>>()?;

        self.enter_depth(location)?;
        tracing::trace!(function = qualified, depth = self.depth, "calling function");

        let locals = params
            .iter()
            .cloned()
            .zip(values)
            .map(|(name, value)| (name, Local { ty: None, value }))
            .collect();
        self.scopes.push(Scope::Function { locals });
        self.namespaces.push(namespace);

        let flow = self.execute_block(body);

        self.namespaces.pop();
        self.scopes.pop();
        self.leave_depth();

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::LogLevel;
    use crate::memory::data_source::MemoryDataSource;
    use crate::parser::Parser;
    use crate::pattern::PatternKind;
    use pretty_assertions::assert_eq;

    fn run(source: &str, data: Vec<u8>) -> (Result<Vec<PatternData>, EvalError>, LogConsole) {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let data = MemoryDataSource::new(data);
        let registry = FunctionRegistry::with_std();
        let mut evaluator = Evaluator::new(&data, &registry, RuntimeConfig::default());
        let result = evaluator.evaluate(&program.nodes);
        (result, evaluator.into_console())
    }

    #[test]
    fn test_struct_members_follow_each_other() {
        let (result, _) = run(
            "struct Header { u16 magic; u16 version; u32 size; };\nHeader header @ 0x00;",
            vec![0x4D, 0x5A, 0x02, 0x00, 0x10, 0x00, 0x00, 0x00],
        );
        let patterns = result.unwrap();
        assert_eq!(patterns.len(), 1);

        let header = &patterns[0];
        assert_eq!(header.kind, PatternKind::Struct);
        assert_eq!(header.size, 8);
        let offsets: Vec<u64> = header.children.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
        assert_eq!(header.child("magic").unwrap().value, Some(Value::Unsigned(0x5A4D, 2)));
        assert_eq!(header.child("size").unwrap().value, Some(Value::Unsigned(0x10, 4)));
    }

    #[test]
    fn test_user_function_recursion() {
        let source = "fn fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\n\
                      std::assert(fib(10) == 55, \"fib\");";
        let (result, _) = run(source, vec![]);
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_recursion_limit_aborts() {
        let (result, console) = run("fn f(n) { return f(n + 1); }\nf(0);", vec![]);
        let err = result.unwrap_err();
        assert!(matches!(err, EvalError::RecursionLimit { limit: 32, .. }));
        assert_eq!(err.location().line, 1);
        assert_eq!(
            console.messages(LogLevel::Error).collect::<Vec<_>>(),
            vec!["recursion limit exceeded (limit is 32)"]
        );
    }

    #[test]
    fn test_locals_keep_their_type() {
        let source = "fn wrap() { u8 x = 250; x = x + 10; return x; }\n\
                      std::assert(wrap() == 4, \"wrapped\");";
        let (result, _) = run(source, vec![]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_while_loop_in_function() {
        let source = "fn sum(n) { u32 i = 0; u32 total = 0; while (i < n) { i = i + 1; total = total + i; } return total; }\n\
                      std::print(sum(4));";
        let (result, console) = run(source, vec![]);
        assert!(result.is_ok());
        assert_eq!(console.messages(LogLevel::Info).collect::<Vec<_>>(), vec!["10"]);
    }

    #[test]
    fn test_wrong_argument_count() {
        let (result, _) = run("fn f(a, b) { return a; }\nf(1);", vec![]);
        assert!(matches!(
            result.unwrap_err(),
            EvalError::ArgumentCount { got: 1, ref function, .. } if function == "f"
        ));
    }

    #[test]
    fn test_namespaced_function_resolution() {
        let source = "namespace util { fn twice(x) { return x * 2; } fn quad(x) { return twice(twice(x)); } }\n\
                      std::assert(util::quad(3) == 12, \"quad\");";
        let (result, _) = run(source, vec![]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_undefined_function() {
        let (result, _) = run("missing(1);", vec![]);
        assert!(matches!(result.unwrap_err(), EvalError::UndefinedFunction { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_builtin_error_gets_call_location() {
        let (result, _) = run("\n\nstd::assert(0, \"boom\");", vec![]);
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "assertion failed \"boom\"");
        assert_eq!(err.location().line, 3);
    }

    #[test]
    fn test_read_past_end_aborts() {
        let (result, _) = run("u32 value @ 0x02;", vec![0; 4]);
        assert!(matches!(
            result.unwrap_err(),
            EvalError::ReadOutOfRange { address: 2, size: 4, .. }
        ));
    }

    #[test]
    fn test_rerun_resets_state() {
        let program = Parser::new("u8 a @ 0; std::print(\"hi\");")
            .unwrap()
            .parse_program()
            .unwrap();
        let data = MemoryDataSource::new(vec![1]);
        let registry = FunctionRegistry::with_std();
        let mut evaluator = Evaluator::new(&data, &registry, RuntimeConfig::default());

        let first = evaluator.evaluate(&program.nodes).unwrap();
        let second = evaluator.evaluate(&program.nodes).unwrap();
        assert_eq!(first, second);
        assert_eq!(evaluator.console().entries().len(), 1);
    }
}
