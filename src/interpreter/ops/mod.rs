//! Operator implementations shared by the evaluator and the validator's
//! constant folding

pub mod binary;
pub mod fold;
pub mod unary;

pub use binary::apply_binary;
pub use fold::fold_constant;
pub use unary::apply_unary;
