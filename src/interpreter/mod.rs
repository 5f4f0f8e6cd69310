//! Pattern evaluation engine
//!
//! This module provides the core execution logic:
//! - [`engine`]: The [`Evaluator`](engine::Evaluator), scopes, statements and function calls
//! - `expressions`: Expression and path evaluation
//! - `placement`: Type instantiation, layout and alignment
//! - [`functions`]: The builtin function registry
//! - [`builtins`]: The `std` library registered into it
//! - [`ops`]: Operator semantics shared with the validator
//! - [`errors`]: Evaluation error types
//!
//! # Execution Model
//!
//! The evaluator walks the AST once. Top-level declarations are placed at a
//! running cursor (or at their `@` address) and become the roots of the
//! resulting pattern forest. Any [`EvalError`](errors::EvalError) aborts the
//! whole run.

pub mod builtins;
pub mod constants;
pub mod engine;
pub mod errors;
mod expressions;
pub mod functions;
pub mod ops;
mod placement;
