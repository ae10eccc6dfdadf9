//! Interpreter errors

/// Everything that can go wrong turning rule text into a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Malformed or disallowed input. `position` is a byte offset.
    #[error("syntax error at {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("math domain error: {function}({argument})")]
    Domain { function: String, argument: f64 },

    #[error("math range error: {operation} overflowed")]
    Overflow { operation: String },

    /// A value offered for substitution was NaN or infinite.
    #[error("cannot substitute non-finite value {value}")]
    NonFiniteInput { value: f64 },
}

impl ExprError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        ExprError::Syntax {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn domain(function: &str, argument: f64) -> Self {
        ExprError::Domain {
            function: function.to_string(),
            argument,
        }
    }

    /// True for errors in the expression text itself, as opposed to errors
    /// caused by the values it was evaluated with.
    pub fn is_syntax(&self) -> bool {
        matches!(self, ExprError::Syntax { .. })
    }
}
