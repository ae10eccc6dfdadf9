//! Tree-walking evaluator

use std::fmt;

use super::error::ExprError;
use super::parser::{parse, BinaryOp, Expr, Function, LogicalOp, UnaryOp};

/// Result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    /// Numeric view; booleans count as 1 and 0.
    pub fn as_number(self) -> f64 {
        match self {
            Value::Number(n) => n,
            Value::Bool(b) => f64::from(u8::from(b)),
        }
    }

    /// Truthiness: non-zero numbers are true.
    pub fn truthy(self) -> bool {
        match self {
            Value::Number(n) => n != 0.0,
            Value::Bool(b) => b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
        }
    }
}

/// Parse and evaluate `expression`.
pub fn evaluate(expression: &str) -> Result<Value, ExprError> {
    eval(&parse(expression)?)
}

/// Evaluate an already-parsed tree.
pub fn eval(expr: &Expr) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Unary { op, operand } => {
            let v = eval(operand)?.as_number();
            Ok(Value::Number(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            }))
        }
        Expr::Binary { op, left, right } => {
            let a = eval(left)?.as_number();
            let b = eval(right)?.as_number();
            binary(*op, a, b).map(Value::Number)
        }
        Expr::Logical { op, operands } => {
            // every operand is evaluated; errors anywhere propagate
            let values = operands
                .iter()
                .map(|e| eval(e).map(Value::truthy))
                .collect::<Result<Vec<bool>, _>>()?;
            Ok(Value::Bool(match op {
                LogicalOp::And => values.iter().all(|&v| v),
                LogicalOp::Or => values.iter().any(|&v| v),
            }))
        }
        Expr::Compare { first, rest } => {
            let mut operands = Vec::with_capacity(rest.len() + 1);
            operands.push(eval(first)?.as_number());
            for (_, e) in rest {
                operands.push(eval(e)?.as_number());
            }
            let holds = rest
                .iter()
                .zip(operands.windows(2))
                .all(|((op, _), pair)| op.apply(pair[0], pair[1]));
            Ok(Value::Bool(holds))
        }
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|e| eval(e).map(Value::as_number))
                .collect::<Result<Vec<f64>, _>>()?;
            call(*function, &args).map(Value::Number)
        }
    }
}

fn binary(op: BinaryOp, a: f64, b: f64) -> Result<f64, ExprError> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(a / b)
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(floored_mod(a, b))
        }
        BinaryOp::Pow => power(a, b, "**"),
    }
}

/// Modulo whose result takes the sign of the divisor.
fn floored_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn power(base: f64, exponent: f64, operation: &str) -> Result<f64, ExprError> {
    if base == 0.0 && exponent < 0.0 {
        return Err(ExprError::DivisionByZero);
    }
    if base < 0.0 && exponent.is_finite() && exponent.fract() != 0.0 {
        return Err(ExprError::domain(operation, base));
    }
    let result = base.powf(exponent);
    check_range(result, operation, &[base, exponent])
}

fn check_range(result: f64, operation: &str, inputs: &[f64]) -> Result<f64, ExprError> {
    if inputs.iter().all(|v| v.is_finite()) {
        if result.is_nan() {
            return Err(ExprError::domain(operation, inputs[0]));
        }
        if result.is_infinite() {
            return Err(ExprError::Overflow {
                operation: operation.to_string(),
            });
        }
    }
    Ok(result)
}

fn call(function: Function, args: &[f64]) -> Result<f64, ExprError> {
    let name = function.name();
    let x = args.first().copied().unwrap_or(0.0);
    let y = args.get(1).copied();
    let domain = |ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(ExprError::domain(name, x))
        }
    };

    let result = match function {
        Function::Sin => x.sin(),
        Function::Cos => x.cos(),
        Function::Tan => x.tan(),
        Function::Asin => {
            domain((-1.0..=1.0).contains(&x))?;
            x.asin()
        }
        Function::Acos => {
            domain((-1.0..=1.0).contains(&x))?;
            x.acos()
        }
        Function::Atan => x.atan(),
        Function::Sinh => x.sinh(),
        Function::Cosh => x.cosh(),
        Function::Tanh => x.tanh(),
        Function::Asinh => x.asinh(),
        Function::Acosh => {
            domain(x >= 1.0)?;
            x.acosh()
        }
        Function::Atanh => {
            domain(x > -1.0 && x < 1.0)?;
            x.atanh()
        }
        Function::Sqrt => {
            domain(x >= 0.0)?;
            x.sqrt()
        }
        Function::Exp => x.exp(),
        Function::Expm1 => x.exp_m1(),
        Function::Log => {
            domain(x > 0.0)?;
            match y {
                None => x.ln(),
                Some(base) => {
                    if base <= 0.0 {
                        return Err(ExprError::domain(name, base));
                    }
                    let denominator = base.ln();
                    if denominator == 0.0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    x.ln() / denominator
                }
            }
        }
        Function::Log10 => {
            domain(x > 0.0)?;
            x.log10()
        }
        Function::Log2 => {
            domain(x > 0.0)?;
            x.log2()
        }
        Function::Log1p => {
            domain(x > -1.0)?;
            x.ln_1p()
        }
        Function::Fabs => x.abs(),
        Function::Floor => x.floor(),
        Function::Ceil => x.ceil(),
        Function::Trunc => x.trunc(),
        Function::Degrees => x.to_degrees(),
        Function::Radians => x.to_radians(),
        Function::Atan2 => x.atan2(y.unwrap_or(0.0)),
        Function::Pow => return power(x, y.unwrap_or(0.0), name),
        Function::Hypot => x.hypot(y.unwrap_or(0.0)),
        Function::Fmod => {
            let d = y.unwrap_or(0.0);
            if d == 0.0 {
                return Err(ExprError::domain(name, x));
            }
            x % d
        }
        Function::Copysign => x.copysign(y.unwrap_or(0.0)),
    };

    check_range(result, name, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(src: &str) -> f64 {
        match evaluate(src) {
            Ok(v) => v.as_number(),
            Err(e) => panic!("{src}: {e}"),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(number("1 + 2 * 3"), 7.0);
        assert_eq!(number("(1 + 2) * 3"), 9.0);
        assert_eq!(number("-2 ** 2"), -4.0);
        assert_eq!(number("2 ** -1"), 0.5);
        assert_eq!(number("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(number("10 / 4"), 2.5);
    }

    #[test]
    fn test_floored_modulo() {
        assert_eq!(number("7 % 3"), 1.0);
        assert_eq!(number("-7 % 3"), 2.0);
        assert_eq!(number("7 % -3"), -2.0);
        assert_eq!(number("fmod(-7, 3)"), -1.0);
    }

    #[test]
    fn test_booleans_in_arithmetic() {
        assert_eq!(number("True + True"), 2.0);
        assert_eq!(evaluate("True == 1").unwrap(), Value::Bool(true));
        assert_eq!(number("-False"), 0.0);
    }

    #[test]
    fn test_logical_returns_bool() {
        assert_eq!(evaluate("1 and 2").unwrap(), Value::Bool(true));
        assert_eq!(evaluate("0 or 0").unwrap(), Value::Bool(false));
        assert_eq!(evaluate("0 or 3").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logical_evaluates_every_operand() {
        // Short-circuiting would hide the division by zero.
        assert_eq!(evaluate("False and 1/0").unwrap_err(), ExprError::DivisionByZero);
        assert_eq!(evaluate("True or 1/0").unwrap_err(), ExprError::DivisionByZero);
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(evaluate("1 < 5 < 10").unwrap(), Value::Bool(true));
        assert_eq!(evaluate("1 < 15 < 10").unwrap(), Value::Bool(false));
        assert_eq!(evaluate("3 >= 3 == 3").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(number("sin(0)"), 0.0);
        assert!((number("cos(pi)") + 1.0).abs() < 1e-12);
        assert!((number("degrees(tau / 4)") - 90.0).abs() < 1e-12);
        assert!((number("log(e)") - 1.0).abs() < 1e-12);
        assert!((number("log(8, 2)") - 3.0).abs() < 1e-12);
        assert_eq!(number("hypot(3, 4)"), 5.0);
        assert_eq!(number("copysign(2, -0.5)"), -2.0);
        assert_eq!(number("fabs(-3.5)"), 3.5);
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(evaluate("1 / 0").unwrap_err(), ExprError::DivisionByZero);
        assert_eq!(evaluate("5 % 0").unwrap_err(), ExprError::DivisionByZero);
        assert_eq!(evaluate("0 ** -1").unwrap_err(), ExprError::DivisionByZero);
        assert!(matches!(evaluate("sqrt(-1)").unwrap_err(), ExprError::Domain { .. }));
        assert!(matches!(evaluate("log(0)").unwrap_err(), ExprError::Domain { .. }));
        assert!(matches!(evaluate("acos(2)").unwrap_err(), ExprError::Domain { .. }));
        assert!(matches!(evaluate("(-8) ** (1/3)").unwrap_err(), ExprError::Domain { .. }));
        assert!(matches!(evaluate("exp(1000)").unwrap_err(), ExprError::Overflow { .. }));
        assert!(!evaluate("1 / 0").unwrap_err().is_syntax());
    }
}
