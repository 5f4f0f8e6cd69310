//! Preprocessor for pattern source text
//!
//! Runs before the lexer in a single pass over the raw text:
//! - strips `//` and `/* */` comments (newlines are kept so line numbers survive)
//! - expands `#include "file"` / `#include <file>` through an [`IncludeResolver`]
//! - records `#define NAME value` and substitutes whole identifiers afterwards
//! - collects `#pragma name value` directives
//!
//! A pragma naming no registered handler fails as soon as it is collected.
//! Once the text pass succeeds, every collected pragma is dispatched in source
//! order to its handler; a rejected value fails at the pragma's line.

use super::ast::SourceLocation;
use crate::config::RuntimeConfig;
use crate::interpreter::constants::MAX_INCLUDE_DEPTH;
use crate::memory::Endian;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Handler invoked with the value of a `#pragma`; returns `false` to reject it
pub type PragmaHandler = Box<dyn FnMut(&str, &mut RuntimeConfig) -> bool>;

/// Preprocessor error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Preprocessor error at line {}: {message}", .location.line)]
pub struct PreprocessorError {
    pub message: String,
    pub location: SourceLocation,
}

impl PreprocessorError {
    fn at_line(line: usize, message: impl Into<String>) -> Self {
        PreprocessorError {
            message: message.into(),
            location: SourceLocation::new(line, 1),
        }
    }
}

/// Supplies the text of `#include`d files
pub trait IncludeResolver {
    fn resolve(&self, path: &str) -> Option<String>;
}

/// Resolves includes relative to the working directory, then each search path
#[derive(Debug, Clone, Default)]
pub struct FsIncludeResolver {
    search_paths: Vec<PathBuf>,
}

impl FsIncludeResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        FsIncludeResolver { search_paths }
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }
}

impl IncludeResolver for FsIncludeResolver {
    fn resolve(&self, path: &str) -> Option<String> {
        std::iter::once(PathBuf::from(path))
            .chain(self.search_paths.iter().map(|dir| dir.join(path)))
            .find(|candidate| candidate.is_file())
            .and_then(|candidate| std::fs::read_to_string(candidate).ok())
    }
}

/// A `#pragma` seen during the text pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub name: String,
    pub value: String,
    pub line: usize,
}

/// Preprocessor with a registry of named pragma handlers
pub struct Preprocessor {
    pragma_handlers: FxHashMap<String, PragmaHandler>,
    include_resolver: Box<dyn IncludeResolver>,
    defines: FxHashMap<String, String>,
    pragmas: Vec<Pragma>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Preprocessor {
            pragma_handlers: FxHashMap::default(),
            include_resolver: Box::new(FsIncludeResolver::default()),
            defines: FxHashMap::default(),
            pragmas: Vec::new(),
        }
    }

    /// Register a handler for `#pragma name`. The first registration for a
    /// name wins; returns `false` if a handler was already present.
    pub fn add_pragma_handler<F>(&mut self, name: &str, handler: F) -> bool
    where
        F: FnMut(&str, &mut RuntimeConfig) -> bool + 'static,
    {
        if self.pragma_handlers.contains_key(name) {
            return false;
        }
        self.pragma_handlers.insert(name.to_string(), Box::new(handler));
        true
    }

    /// Install permissive handlers for pragmas that are only meaningful to
    /// some hosts, so programs using them still preprocess everywhere.
    pub fn add_default_pragma_handlers(&mut self) {
        self.add_pragma_handler("MIME", |value, _| !value.is_empty() && !value.contains(char::is_whitespace));
        self.add_pragma_handler("endian", |value, _| Endian::from_pragma(value).is_some());
    }

    pub fn set_include_resolver(&mut self, resolver: Box<dyn IncludeResolver>) {
        self.include_resolver = resolver;
    }

    /// Pragmas collected by the last call to [`Preprocessor::preprocess`]
    pub fn pragmas(&self) -> &[Pragma] {
        &self.pragmas
    }

    /// Strip comments, expand directives and dispatch pragmas
    pub fn preprocess(&mut self, source: &str, config: &mut RuntimeConfig) -> Result<String, PreprocessorError> {
        self.defines.clear();
        self.pragmas.clear();

        let output = self.process_text(source, 0)?;
        tracing::debug!(pragmas = self.pragmas.len(), "preprocessed source");

        for pragma in &self.pragmas {
            let handler = self.pragma_handlers.get_mut(&pragma.name).ok_or_else(|| {
                PreprocessorError::at_line(
                    pragma.line,
                    format!("no pragma handler registered for type '{}'", pragma.name),
                )
            })?;

            if !handler(&pragma.value, config) {
                return Err(PreprocessorError::at_line(
                    pragma.line,
                    format!("invalid value provided to '{}' #pragma directive", pragma.name),
                ));
            }
        }

        Ok(output)
    }

    fn process_text(&mut self, source: &str, depth: usize) -> Result<String, PreprocessorError> {
        let input: Vec<char> = source.chars().collect();
        let mut output = String::with_capacity(source.len());
        let mut position = 0;
        let mut line = 1;
        let mut at_line_start = true;

        while position < input.len() {
            let ch = input[position];
            let next = input.get(position + 1).copied();

            match ch {
                '\n' => {
                    output.push('\n');
                    line += 1;
                    position += 1;
                    at_line_start = true;
                    continue;
                }
                '#' if at_line_start => {
                    let end = input[position..]
                        .iter()
                        .position(|&c| c == '\n')
                        .map_or(input.len(), |n| position + n);
                    let directive: String = input[position + 1..end].iter().collect();
                    self.process_directive(directive.trim(), line, depth, &mut output)?;
                    position = end;
                }
                '/' if next == Some('/') => {
                    while position < input.len() && input[position] != '\n' {
                        position += 1;
                    }
                }
                '/' if next == Some('*') => {
                    let start_line = line;
                    position += 2;
                    loop {
                        match input.get(position) {
                            None => {
                                return Err(PreprocessorError::at_line(start_line, "unterminated comment"));
                            }
                            Some('*') if input.get(position + 1) == Some(&'/') => {
                                position += 2;
                                break;
                            }
                            Some('\n') => {
                                output.push('\n');
                                line += 1;
                                position += 1;
                            }
                            Some(_) => position += 1,
                        }
                    }
                    output.push(' ');
                }
                '"' | '\'' => {
                    // Literals are copied verbatim; the lexer reports unterminated ones
                    output.push(ch);
                    position += 1;
                    while let Some(&c) = input.get(position) {
                        if c == '\n' {
                            break;
                        }
                        output.push(c);
                        position += 1;
                        if c == '\\' {
                            if let Some(&escaped) = input.get(position) {
                                if escaped != '\n' {
                                    output.push(escaped);
                                    position += 1;
                                }
                            }
                        } else if c == ch {
                            break;
                        }
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let start = position;
                    while input.get(position).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') {
                        position += 1;
                    }
                    let ident: String = input[start..position].iter().collect();
                    match self.defines.get(&ident) {
                        Some(replacement) => output.push_str(replacement),
                        None => output.push_str(&ident),
                    }
                }
                c if c.is_ascii_digit() => {
                    // Numbers with suffixes must not be mistaken for defines
                    while input.get(position).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '.') {
                        output.push(input[position]);
                        position += 1;
                    }
                }
                c => {
                    output.push(c);
                    position += 1;
                }
            }

            // Directives may be indented but must come first on their line
            if !matches!(ch, ' ' | '\t' | '\r') {
                at_line_start = false;
            }
        }

        Ok(output)
    }

    fn process_directive(
        &mut self,
        directive: &str,
        line: usize,
        depth: usize,
        output: &mut String,
    ) -> Result<(), PreprocessorError> {
        let (name, rest) = split_word(directive);

        match name {
            "include" => {
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(PreprocessorError::at_line(line, "#include nesting too deep"));
                }
                let path = rest
                    .strip_prefix('"')
                    .and_then(|r| r.strip_suffix('"'))
                    .or_else(|| rest.strip_prefix('<').and_then(|r| r.strip_suffix('>')))
                    .ok_or_else(|| PreprocessorError::at_line(line, "invalid #include path"))?;

                let text = self
                    .include_resolver
                    .resolve(path)
                    .ok_or_else(|| PreprocessorError::at_line(line, format!("failed to include '{}'", path)))?;

                tracing::debug!(path, depth, "expanding include");
                let included = self.process_text(&text, depth + 1)?;
                output.push_str(&included);
            }
            "define" => {
                let (ident, value) = split_word(rest);
                if ident.is_empty() || !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(PreprocessorError::at_line(line, "no name given in #define directive"));
                }
                self.defines.insert(ident.to_string(), value.to_string());
            }
            "pragma" => {
                let (key, value) = split_word(rest);
                if key.is_empty() {
                    return Err(PreprocessorError::at_line(line, "no instruction given in #pragma directive"));
                }
                if !self.pragma_handlers.contains_key(key) {
                    return Err(PreprocessorError::at_line(
                        line,
                        format!("no pragma handler registered for type '{}'", key),
                    ));
                }
                self.pragmas.push(Pragma {
                    name: key.to_string(),
                    value: value.to_string(),
                    line,
                });
            }
            _ => {
                return Err(PreprocessorError::at_line(
                    line,
                    format!("unknown preprocessor directive '#{}'", name),
                ));
            }
        }

        Ok(())
    }
}

/// Split off the first whitespace-delimited word; the rest is trimmed
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    }
}
