//! Rule templates with a single numeric placeholder

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ExprError;
use super::eval::{evaluate, Value};
use super::parser::parse;

/// Placeholder replaced by the measured value.
pub const PLACEHOLDER: &str = "@value";

/// Text of a rule such as `@value > 60 or @value < -20`.
///
/// [`render`](RuleExpression::render) is the only way a value enters the
/// text. Every occurrence of `@value` becomes the value's literal wrapped in
/// parentheses, so `-@value` with `-5.0` reads `-(-5.0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleExpression {
    template: String,
}

impl RuleExpression {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn has_placeholder(&self) -> bool {
        self.template.contains(PLACEHOLDER)
    }

    pub fn is_blank(&self) -> bool {
        self.template.trim().is_empty()
    }

    /// Substitute `value` for every placeholder.
    pub fn render(&self, value: f64) -> Result<String, ExprError> {
        if !value.is_finite() {
            return Err(ExprError::NonFiniteInput { value });
        }
        Ok(self.template.replace(PLACEHOLDER, &format!("({value:?})")))
    }

    /// Render with `value` and evaluate.
    pub fn evaluate(&self, value: f64) -> Result<Value, ExprError> {
        evaluate(&self.render(value)?)
    }

    /// Syntax check without evaluating. Arithmetic errors that depend on the
    /// substituted value are not detected here.
    pub fn check(&self) -> Result<(), ExprError> {
        parse(&self.render(0.0)?).map(|_| ())
    }
}

impl fmt::Display for RuleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl From<&str> for RuleExpression {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for RuleExpression {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}
