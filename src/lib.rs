//! # Introduction
//!
//! hexpat runs programs written in a small declarative pattern language
//! against a byte-addressable data source and produces a tree of typed,
//! located, named regions ("pattern data") describing the bytes.
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Preprocessor → Lexer → Parser → Validator → Evaluator → Pattern data
//! ```
//!
//! 1. [`parser::preprocessor`] strips comments, expands `#include`/`#define`
//!    and dispatches `#pragma` directives to registered handlers.
//! 2. [`parser`] tokenises the text and builds an AST.
//! 3. [`validator`] checks names, duplicates and constant expressions without
//!    touching the data.
//! 4. [`interpreter`] walks the AST, reading through a
//!    [`memory::data_source::DataSource`], and builds [`pattern::PatternData`].
//! 5. [`console`] collects the messages logged during the run.
//!
//! Each stage either hands its result on or stops the run with a located
//! error, exposed as [`PatternLanguageError`].
//!
//! ## Example
//!
//! ```
//! use hexpat::memory::data_source::MemoryDataSource;
//! use hexpat::PatternLanguage;
//!
//! let mut data = MemoryDataSource::new(vec![0x4D, 0x5A, 0x90, 0x00]);
//! let mut runtime = PatternLanguage::new();
//!
//! let patterns = runtime
//!     .execute_string(&mut data, "struct Dos { char magic[2]; u16 extra; };\nDos dos @ 0x00;")
//!     .unwrap();
//! assert_eq!(patterns[0].child("extra").unwrap().offset, 2);
//! ```

pub mod config;
pub mod console;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod pattern;
pub mod validator;

use std::path::Path;

use config::{parse_c_integer, RuntimeConfig};
use console::{LogConsole, LogLevel};
use interpreter::engine::Evaluator;
use interpreter::errors::EvalError;
use interpreter::functions::FunctionRegistry;
use memory::data_source::DataSource;
use memory::Endian;
use parser::ast::SourceLocation;
use parser::lexer::{LexError, Lexer};
use parser::preprocessor::{IncludeResolver, Preprocessor, PreprocessorError};
use parser::{ParseError, Parser};
use pattern::PatternData;
use thiserror::Error;
use validator::{ValidationError, Validator};

/// The single error reported by a failed run, tagged with its stage
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternLanguageError {
    #[error(transparent)]
    Preprocessor(#[from] PreprocessorError),

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Evaluation error at line {}: {0}", .0.location().line)]
    Evaluation(#[from] EvalError),
}

impl PatternLanguageError {
    /// Source line the error points at; `0` when it has no position
    pub fn line(&self) -> usize {
        match self {
            PatternLanguageError::Preprocessor(e) => e.location.line,
            PatternLanguageError::Lex(e) => e.location.line,
            PatternLanguageError::Parse(e) => e.location.line,
            PatternLanguageError::Validation(e) => e.location.line,
            PatternLanguageError::Evaluation(e) => e.location().line,
        }
    }

    /// The message without the stage prefix
    pub fn message(&self) -> String {
        match self {
            PatternLanguageError::Preprocessor(e) => e.message.clone(),
            PatternLanguageError::Lex(e) => e.message.clone(),
            PatternLanguageError::Parse(e) => e.message.clone(),
            PatternLanguageError::Validation(e) => e.message.clone(),
            PatternLanguageError::Evaluation(e) => e.to_string(),
        }
    }
}

/// Install the pragmas that configure the evaluator itself
fn add_engine_pragma_handlers(preprocessor: &mut Preprocessor) {
    preprocessor.add_pragma_handler("endian", |value, config| match Endian::from_pragma(value) {
        Some(endian) => {
            config.default_endian = endian;
            true
        }
        None => false,
    });

    preprocessor.add_pragma_handler("eval_depth", |value, config| match parse_c_integer(value) {
        Some(limit) if limit > 0 => {
            let limit = u32::try_from(limit).unwrap_or(u32::MAX);
            *config = config.clone().with_recursion_limit(limit);
            true
        }
        _ => false,
    });

    preprocessor.add_pragma_handler("base_address", |value, config| {
        match parse_c_integer(value).and_then(|address| u64::try_from(address).ok()) {
            Some(address) => {
                config.base_address = Some(address);
                true
            }
            None => false,
        }
    });

    preprocessor.add_pragma_handler("alignment", |value, config| {
        match parse_c_integer(value).and_then(|alignment| u64::try_from(alignment).ok()) {
            Some(alignment) if alignment.is_power_of_two() => {
                config.alignment = Some(alignment);
                true
            }
            _ => false,
        }
    });
}

/// Host facade running the whole pipeline
pub struct PatternLanguage {
    config: RuntimeConfig,
    preprocessor: Preprocessor,
    registry: FunctionRegistry,
    error: Option<PatternLanguageError>,
    console: LogConsole,
}

impl Default for PatternLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternLanguage {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Runtime whose runs start from `config`; pragmas adjust a per-run copy
    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut preprocessor = Preprocessor::new();
        add_engine_pragma_handlers(&mut preprocessor);
        preprocessor.add_default_pragma_handlers();

        PatternLanguage {
            config,
            preprocessor,
            registry: FunctionRegistry::with_std(),
            error: None,
            console: LogConsole::new(),
        }
    }

    /// Register a host pragma handler. Returns `false` if `name` is already handled.
    pub fn add_pragma_handler<F>(&mut self, name: &str, handler: F) -> bool
    where
        F: FnMut(&str, &mut RuntimeConfig) -> bool + 'static,
    {
        self.preprocessor.add_pragma_handler(name, handler)
    }

    /// Registry for host-provided native functions
    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    pub fn set_include_resolver(&mut self, resolver: Box<dyn IncludeResolver>) {
        self.preprocessor.set_include_resolver(resolver);
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `text` against `source`. Returns `None` if any stage failed; the
    /// cause is then available through [`PatternLanguage::error`].
    pub fn execute_string(&mut self, source: &mut dyn DataSource, text: &str) -> Option<Vec<PatternData>> {
        self.error = None;
        self.console.clear();

        match self.run(source, text) {
            Ok(patterns) => {
                tracing::debug!(patterns = patterns.len(), "run finished");
                Some(patterns)
            }
            Err(err) => {
                tracing::debug!(line = err.line(), %err, "run failed");
                self.error = Some(err);
                None
            }
        }
    }

    /// Read `path` and run its contents. A read failure is reported as a
    /// preprocessing error without a line.
    pub fn execute_file(&mut self, source: &mut dyn DataSource, path: impl AsRef<Path>) -> Option<Vec<PatternData>> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => self.execute_string(source, &text),
            Err(err) => {
                self.console.clear();
                self.error = Some(PatternLanguageError::Preprocessor(PreprocessorError {
                    message: format!("failed to read '{}': {}", path.display(), err),
                    location: SourceLocation::default(),
                }));
                None
            }
        }
    }

    /// Error of the last run, if it failed
    pub fn error(&self) -> Option<&PatternLanguageError> {
        self.error.as_ref()
    }

    /// Messages logged during the last run, in order
    pub fn console_log(&self) -> &[(LogLevel, String)] {
        self.console.entries()
    }

    fn run(&mut self, source: &mut dyn DataSource, text: &str) -> Result<Vec<PatternData>, PatternLanguageError> {
        let mut config = self.config.clone();

        let preprocessed = self.preprocessor.preprocess(text, &mut config)?;
        let tokens = Lexer::new(&preprocessed).tokenize()?;
        let program = Parser::from_tokens(tokens).parse_program()?;
        tracing::debug!(declarations = program.nodes.len(), "parsed program");

        Validator::new(&self.registry).validate(&program.nodes)?;

        if let Some(address) = config.base_address {
            source.set_base_address(address);
        }

        let mut evaluator = Evaluator::new(&*source, &self.registry, config);
        let result = evaluator.evaluate(&program.nodes);
        self.console = evaluator.into_console();
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::data_source::MemoryDataSource;
    use memory::value::Value;

    fn data(bytes: &[u8]) -> MemoryDataSource {
        MemoryDataSource::new(bytes.to_vec())
    }

    #[test]
    fn test_endian_pragma_changes_default_byte_order() {
        let mut runtime = PatternLanguage::new();
        let patterns = runtime
            .execute_string(&mut data(&[0x12, 0x34]), "#pragma endian big\nu16 value @ 0;")
            .unwrap();
        assert_eq!(patterns[0].value, Some(Value::Unsigned(0x1234, 2)));
        assert_eq!(patterns[0].endian, Endian::Big);
    }

    #[test]
    fn test_pragmas_do_not_leak_into_the_next_run() {
        let mut runtime = PatternLanguage::new();
        runtime.execute_string(&mut data(&[0x12, 0x34]), "#pragma endian big\nu16 a;").unwrap();

        let patterns = runtime.execute_string(&mut data(&[0x12, 0x34]), "u16 a;").unwrap();
        assert_eq!(patterns[0].value, Some(Value::Unsigned(0x3412, 2)));
        assert_eq!(runtime.config().default_endian, Endian::Little);
    }

    #[test]
    fn test_eval_depth_pragma() {
        let source = "#pragma eval_depth 3\nfn f(n) { if (n == 0) { return 0; } return f(n - 1); }\nf(5);";
        let mut runtime = PatternLanguage::new();
        assert!(runtime.execute_string(&mut data(&[]), source).is_none());

        let err = runtime.error().unwrap();
        assert!(matches!(err, PatternLanguageError::Evaluation(EvalError::RecursionLimit { limit: 3, .. })));
    }

    #[test]
    fn test_invalid_eval_depth_is_rejected() {
        let mut runtime = PatternLanguage::new();
        assert!(runtime.execute_string(&mut data(&[]), "#pragma eval_depth 0").is_none());

        let err = runtime.error().unwrap();
        assert!(matches!(err, PatternLanguageError::Preprocessor(_)));
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn test_alignment_pragma_packs_structs() {
        let source = "#pragma alignment 1\nstruct S { u8 a; u32 b; };\nS s @ 0;";
        let mut runtime = PatternLanguage::new();
        let patterns = runtime.execute_string(&mut data(&[0; 8]), source).unwrap();
        assert_eq!(patterns[0].child("b").unwrap().offset, 1);
        assert_eq!(patterns[0].size, 5);

        assert!(runtime.execute_string(&mut data(&[]), "#pragma alignment 3").is_none());
    }

    #[test]
    fn test_base_address_pragma_is_forwarded() {
        let mut source = data(&[0; 4]);
        let mut runtime = PatternLanguage::new();
        runtime
            .execute_string(&mut source, "#pragma base_address 0x1000\nstd::print(std::mem::base_address());")
            .unwrap();
        assert_eq!(source.base_address(), 0x1000);
        assert_eq!(runtime.console_log()[0].1, "4096");
    }

    #[test]
    fn test_errors_are_tagged_with_their_stage() {
        let mut runtime = PatternLanguage::new();

        runtime.execute_string(&mut data(&[]), "u8 a = 'x;");
        assert!(matches!(runtime.error(), Some(PatternLanguageError::Lex(_))));

        runtime.execute_string(&mut data(&[]), "struct { u8 a; };");
        assert!(matches!(runtime.error(), Some(PatternLanguageError::Parse(_))));

        runtime.execute_string(&mut data(&[]), "struct A { u8 x; };\nstruct A { u8 y; };");
        let err = runtime.error().unwrap();
        assert!(matches!(err, PatternLanguageError::Validation(_)));
        assert_eq!(err.line(), 2);
        assert_eq!(err.message(), "redefinition of type 'A'");

        runtime.execute_string(&mut data(&[1]), "u16 a @ 0;");
        assert!(matches!(runtime.error(), Some(PatternLanguageError::Evaluation(_))));
    }

    #[test]
    fn test_evaluation_error_display_names_the_line() {
        let mut runtime = PatternLanguage::new();
        runtime.execute_string(&mut data(&[0]), "u8 a;\nstd::assert(false, \"boom\");");
        assert_eq!(
            runtime.error().unwrap().to_string(),
            "Evaluation error at line 2: assertion failed \"boom\""
        );
    }

    #[test]
    fn test_console_and_error_reset_between_runs() {
        let mut runtime = PatternLanguage::new();
        runtime.execute_string(&mut data(&[]), "std::print(\"hello\");\nstd::assert(false, \"stop\");");
        assert!(runtime.error().is_some());
        assert_eq!(runtime.console_log().len(), 2);
        assert_eq!(runtime.console_log()[0], (LogLevel::Info, "hello".to_string()));
        assert_eq!(runtime.console_log()[1].0, LogLevel::Error);

        assert!(runtime.execute_string(&mut data(&[7]), "u8 a;").is_some());
        assert!(runtime.error().is_none());
        assert!(runtime.console_log().is_empty());
    }

    #[test]
    fn test_host_pragma_handler() {
        let mut runtime = PatternLanguage::new();
        assert!(!runtime.add_pragma_handler("endian", |_, _| true));
        assert!(runtime.add_pragma_handler("author", |value, _| !value.is_empty()));

        assert!(runtime.execute_string(&mut data(&[]), "#pragma author someone").is_some());
    }

    #[test]
    fn test_host_native_function() {
        let mut runtime = PatternLanguage::new();
        runtime
            .registry_mut()
            .register(&["host"], "answer", interpreter::functions::Arity::Exactly(0), &[], |_, _| {
                Ok(Some(Value::Unsigned(42, 4)))
            })
            .unwrap();

        let patterns = runtime.execute_string(&mut data(&[]), "fn get() { return host::answer(); }\nstd::print(get());");
        assert!(patterns.is_some());
        assert_eq!(runtime.console_log()[0].1, "42");
    }

    #[test]
    fn test_execute_missing_file() {
        let mut runtime = PatternLanguage::new();
        assert!(runtime.execute_file(&mut data(&[]), "/nonexistent/pattern.hexpat").is_none());

        let err = runtime.error().unwrap();
        assert!(matches!(err, PatternLanguageError::Preprocessor(_)));
        assert_eq!(err.line(), 0);
    }
}
