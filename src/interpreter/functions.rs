//! Builtin function registry
//!
//! Native functions are keyed by `(namespace path, name)` and carry a typed
//! descriptor: an [`Arity`] contract and the [`ArgKind`] of every parameter.
//! Signatures are validated once when a function is registered; the engine
//! checks every call against them before dispatch, so implementations only
//! ever see arguments of the declared kinds.

use crate::console::{LogConsole, LogLevel};
use crate::interpreter::errors::EvalError;
use crate::memory::data_source::DataSource;
use crate::memory::value::Value;
use crate::memory::Endian;
use crate::parser::ast::{NamespacePath, SourceLocation};
use rustc_hash::FxHashMap;
use std::fmt;
use thiserror::Error;

/// How many arguments a function accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    None,
    /// Strictly more than `n` arguments
    MoreThan(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::None => count == 0,
            Arity::MoreThan(n) => count > *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{}", n),
            Arity::None => write!(f, "0"),
            Arity::MoreThan(n) => write!(f, "more than {}", n),
        }
    }
}

/// Literal kind a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Any numeric literal (integers, floats, chars, bools)
    Integer,
    String,
    Any,
}

impl ArgKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ArgKind::Integer => value.is_numeric(),
            ArgKind::String => value.is_string(),
            ArgKind::Any => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArgKind::Integer => "integer",
            ArgKind::String => "string",
            ArgKind::Any => "any value",
        }
    }
}

/// What a native function sees of the running evaluation
pub struct CallContext<'c> {
    pub source: &'c dyn DataSource,
    pub console: &'c mut LogConsole,
    /// Byte order active for the run
    pub endian: Endian,
}

impl CallContext<'_> {
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.console.log(level, message);
    }
}

/// Native implementation. Returns `None` for functions without a result.
pub type NativeFn = Box<dyn Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>, EvalError>>;

/// Typed descriptor of a registered function
pub struct FunctionEntry {
    pub arity: Arity,
    pub params: Vec<ArgKind>,
    pub implementation: NativeFn,
}

impl FunctionEntry {
    /// Kind expected for the argument at `index`; variadic tails repeat the last kind
    pub fn kind_of(&self, index: usize) -> ArgKind {
        self.params
            .get(index)
            .or_else(|| self.params.last())
            .copied()
            .unwrap_or(ArgKind::Any)
    }

    /// Check count and kinds of evaluated arguments against the descriptor
    pub fn check_arguments(&self, function: &str, args: &[Value], location: SourceLocation) -> Result<(), EvalError> {
        if !self.arity.accepts(args.len()) {
            return Err(EvalError::ArgumentCount {
                function: function.to_string(),
                expected: self.arity.to_string(),
                got: args.len(),
                location,
            });
        }

        for (index, arg) in args.iter().enumerate() {
            let kind = self.kind_of(index);
            if !kind.matches(arg) {
                return Err(EvalError::ArgumentKind {
                    function: function.to_string(),
                    index,
                    expected: kind.name(),
                    got: arg.kind_name(),
                    location,
                });
            }
        }

        Ok(())
    }
}

/// Registration failures, reported to the embedding host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid signature for function '{name}': arity {arity} with {kinds} parameter kinds")]
    InvalidSignature { name: String, arity: String, kinds: usize },
}

/// Namespaced catalog of native functions
#[derive(Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<(NamespacePath, String), FunctionEntry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the `std` library
    pub fn with_std() -> Self {
        let mut registry = Self::new();
        crate::interpreter::builtins::register_std(&mut registry);
        registry
    }

    /// Register `name` under `path`.
    ///
    /// `params` lists the kind of each parameter: exactly `n` kinds for
    /// `Exactly(n)`, none for `None` and `n + 1` for `MoreThan(n)`, where the
    /// last kind applies to every further argument.
    pub fn register<F>(
        &mut self,
        path: &[&str],
        name: &str,
        arity: Arity,
        params: &[ArgKind],
        implementation: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>, EvalError> + 'static,
    {
        let path = NamespacePath::from(path);
        let qualified = path.qualify(name);

        let expected_kinds = match arity {
            Arity::Exactly(n) => n,
            Arity::None => 0,
            Arity::MoreThan(n) => n + 1,
        };
        if params.len() != expected_kinds {
            return Err(RegistryError::InvalidSignature {
                name: qualified,
                arity: arity.to_string(),
                kinds: params.len(),
            });
        }

        let key = (path, name.to_string());
        if self.functions.contains_key(&key) {
            return Err(RegistryError::Duplicate(qualified));
        }

        tracing::trace!(function = %qualified, %arity, "registered builtin");
        self.functions.insert(
            key,
            FunctionEntry {
                arity,
                params: params.to_vec(),
                implementation: Box::new(implementation),
            },
        );
        Ok(())
    }

    pub fn resolve(&self, path: &NamespacePath, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(&(path.clone(), name.to_string()))
    }

    pub fn contains(&self, path: &NamespacePath, name: &str) -> bool {
        self.resolve(path, name).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
