// Constants for the pattern evaluator

/// Recursion limit used when no `eval_depth` pragma is given
pub const DEFAULT_RECURSION_LIMIT: u32 = 32;

/// Upper bound for `eval_depth`; larger values are clamped to keep the host stack safe
pub const MAX_RECURSION_LIMIT: u32 = 1024;

/// Maximum nesting of `#include` directives
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Maximum nesting of parenthesised, prefix and ternary sub-expressions
pub const MAX_EXPRESSION_DEPTH: usize = 128;

/// Maximum element count of a single array pattern
pub const MAX_ARRAY_ELEMENTS: u64 = 0x10_0000;
