//! Pattern source front end
//!
//! This module transforms pattern source text into an Abstract Syntax Tree (AST):
//! - [`preprocessor`]: Comment stripping, `#include`, `#define` and `#pragma` handling
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`parse`]: Parsing (tokens → AST), extended by the declaration, statement
//!   and expression modules
//! - [`ast`]: AST node definitions
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with precedence climbing for binary operators.
//! No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod parse;
pub mod preprocessor;
mod statements;

pub use parse::{ParseError, Parser};
