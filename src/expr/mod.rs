//! Sandboxed rule-expression interpreter
//!
//! A small language of numbers, `pi`/`e`/`tau`, `True`/`False`, arithmetic,
//! allow-listed math functions, `and`/`or` and chained comparisons. There
//! are no variables, attribute lookups, strings or statements, so evaluating
//! a rule can never touch anything outside the expression.
//!
//! ```
//! use kinesync::expr::{evaluate, Value};
//!
//! assert_eq!(evaluate("1 < 5 < 10").unwrap(), Value::Bool(true));
//! assert!(evaluate("undefined_fn(1)").unwrap_err().is_syntax());
//! ```

mod error;
mod eval;
mod lexer;
mod parser;
mod rule;

pub use error::ExprError;
pub use eval::{eval, evaluate, Value};
pub use parser::{parse, BinaryOp, CompareOp, Expr, Function, LogicalOp, UnaryOp, MAX_DEPTH};
pub use rule::{RuleExpression, PLACEHOLDER};
