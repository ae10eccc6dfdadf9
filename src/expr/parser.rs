//! Recursive-descent parser producing an [`Expr`] tree
//!
//! Precedence, lowest first:
//!
//! ```text
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := comparison ("and" comparison)*
//! comparison := sum (cmp_op sum)*
//! sum        := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := ("+" | "-") unary | power
//! power      := primary (("**" | "^") unary)?
//! primary    := number | constant | "True" | "False" | call | "(" or_expr ")"
//! ```

use std::f64::consts::{E, PI, TAU};
use std::fmt;

use super::error::ExprError;
use super::lexer::{tokenize, Token, TokenKind};

/// Deepest nesting accepted, counting parentheses, calls, unary operators
/// and every link of an arithmetic chain.
pub const MAX_DEPTH: usize = 64;

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        }
    }
}

/// Allow-listed math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Sqrt,
    Exp,
    Expm1,
    Log,
    Log10,
    Log2,
    Log1p,
    Fabs,
    Floor,
    Ceil,
    Trunc,
    Degrees,
    Radians,
    Atan2,
    Pow,
    Hypot,
    Fmod,
    Copysign,
}

impl Function {
    const ALL: [Function; 30] = [
        Function::Sin,
        Function::Cos,
        Function::Tan,
        Function::Asin,
        Function::Acos,
        Function::Atan,
        Function::Sinh,
        Function::Cosh,
        Function::Tanh,
        Function::Asinh,
        Function::Acosh,
        Function::Atanh,
        Function::Sqrt,
        Function::Exp,
        Function::Expm1,
        Function::Log,
        Function::Log10,
        Function::Log2,
        Function::Log1p,
        Function::Fabs,
        Function::Floor,
        Function::Ceil,
        Function::Trunc,
        Function::Degrees,
        Function::Radians,
        Function::Atan2,
        Function::Pow,
        Function::Hypot,
        Function::Fmod,
        Function::Copysign,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Asinh => "asinh",
            Function::Acosh => "acosh",
            Function::Atanh => "atanh",
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Expm1 => "expm1",
            Function::Log => "log",
            Function::Log10 => "log10",
            Function::Log2 => "log2",
            Function::Log1p => "log1p",
            Function::Fabs => "fabs",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Trunc => "trunc",
            Function::Degrees => "degrees",
            Function::Radians => "radians",
            Function::Atan2 => "atan2",
            Function::Pow => "pow",
            Function::Hypot => "hypot",
            Function::Fmod => "fmod",
            Function::Copysign => "copysign",
        }
    }

    pub fn from_name(name: &str) -> Option<Function> {
        Function::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Function::Log => (1, 2),
            Function::Atan2 | Function::Pow | Function::Hypot | Function::Fmod | Function::Copysign => {
                (2, 2)
            }
            _ => (1, 1),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a and b and c`, kept flat.
    Logical {
        op: LogicalOp,
        operands: Vec<Expr>,
    },
    /// `a < b <= c`: `first` followed by (operator, operand) pairs.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(PI),
        "e" => Some(E),
        "tau" => Some(TAU),
        _ => None,
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Parse a complete expression.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or_expr()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ExprError::syntax(
            format!("unexpected {}", trailing.kind.describe()),
            trailing.position,
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExprError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            let found = self.peek();
            Err(ExprError::syntax(
                format!("expected {}, found {}", kind.describe(), found.kind.describe()),
                found.position,
            ))
        }
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::syntax(
                "expression nested too deeply",
                self.peek().position,
            ));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn logical(
        &mut self,
        op: LogicalOp,
        token: TokenKind,
        next: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let first = next(self)?;
        if self.peek().kind != token {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(&token) {
            operands.push(next(self)?);
        }
        Ok(Expr::Logical { op, operands })
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        self.logical(LogicalOp::Or, TokenKind::Or, Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        self.logical(LogicalOp::And, TokenKind::And, Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let first = self.sum()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => CompareOp::Eq,
                TokenKind::NotEq => CompareOp::Ne,
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::Le => CompareOp::Le,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::Ge => CompareOp::Ge,
                _ => break,
            };
            self.advance();
            rest.push((op, self.sum()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn sum(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.term()?;
        let mut links = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            // each link nests the tree built so far one level deeper
            self.descend()?;
            links += 1;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            // each link nests the tree built so far one level deeper
            self.descend()?;
            links += 1;
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek().kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            _ => return self.power(),
        };
        self.advance();
        self.descend()?;
        let operand = self.unary()?;
        self.ascend();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.primary()?;
        if !self.eat(&TokenKind::Power) {
            return Ok(base);
        }
        self.descend()?;
        let exponent = self.unary()?;
        self.ascend();
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::LParen => {
                self.descend()?;
                let inner = self.or_expr()?;
                self.expect(TokenKind::RParen)?;
                self.ascend();
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::LParen {
                    self.call(&name, token.position)
                } else {
                    constant(&name).map(Expr::Number).ok_or_else(|| {
                        ExprError::syntax(format!("unknown name '{name}'"), token.position)
                    })
                }
            }
            other => Err(ExprError::syntax(
                format!("unexpected {}", other.describe()),
                token.position,
            )),
        }
    }

    fn call(&mut self, name: &str, position: usize) -> Result<Expr, ExprError> {
        let function = Function::from_name(name)
            .ok_or_else(|| ExprError::syntax(format!("unknown function {name}()"), position))?;

        self.expect(TokenKind::LParen)?;
        self.descend()?;
        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.or_expr()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen)?;
                break;
            }
        }
        self.ascend();

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} or {max}")
            };
            return Err(ExprError::syntax(
                format!("{name}() takes {expected} argument(s), got {}", args.len()),
                position,
            ));
        }
        Ok(Expr::Call { function, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        let expr = parse("-2 ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOp::Minus,
                operand: Box::new(Expr::Binary {
                    op: BinaryOp::Pow,
                    left: num(2.0),
                    right: num(2.0),
                }),
            }
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse("2 ^ 3 ** 2").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Pow,
                left,
                right,
            } => {
                assert_eq!(left, num(2.0));
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. }));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_chain_stays_flat() {
        match parse("1 < 2 <= 3 != 4").unwrap() {
            Expr::Compare { rest, .. } => {
                let ops: Vec<CompareOp> = rest.iter().map(|(op, _)| *op).collect();
                assert_eq!(ops, vec![CompareOp::Lt, CompareOp::Le, CompareOp::Ne]);
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        match parse("True or False and False").unwrap() {
            Expr::Logical {
                op: LogicalOp::Or,
                operands,
            } => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[1], Expr::Logical { op: LogicalOp::And, .. }));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_unknown_names_and_functions() {
        assert!(parse("x + 1").unwrap_err().is_syntax());
        assert!(parse("undefined_fn(1)").unwrap_err().is_syntax());
        assert!(parse("__import__('os')").unwrap_err().is_syntax());
    }

    #[test]
    fn test_arity_checked_at_parse_time() {
        assert!(parse("sin(1, 2)").is_err());
        assert!(parse("atan2(1)").is_err());
        assert!(parse("log(8, 2)").is_ok());
        assert!(parse("log(8, 2, 3)").is_err());
        assert!(parse("hypot()").is_err());
    }

    #[test]
    fn test_malformed_input() {
        for src in ["", "1 +", "(1", "1)", "1 2", "* 3", "1 // 2", "sin(1,)", "pi()"] {
            assert!(parse(src).unwrap_err().is_syntax(), "{src:?} should fail");
        }
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(parse(&deep).unwrap_err().is_syntax());
        let ok = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(parse(&ok).unwrap(), Expr::Number(1.0));
    }

    #[test]
    fn test_long_arithmetic_chain_is_rejected() {
        let sum = format!("1{}", "+1".repeat(200_000));
        let err = parse(&sum).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.to_string().contains("nested too deeply"), "{err}");

        let product = format!("2{}", " * 2 / 2".repeat(100_000));
        assert!(parse(&product).unwrap_err().is_syntax());
    }

    #[test]
    fn test_chain_links_share_the_depth_budget() {
        let chain = |links: usize| format!("1{}", "+1".repeat(links));
        assert!(parse(&chain(MAX_DEPTH)).is_ok());
        assert!(parse(&chain(MAX_DEPTH + 1)).is_err());

        // parentheses around a chain spend from the same budget
        let wrapped = format!("({})", chain(MAX_DEPTH));
        assert!(parse(&wrapped).is_err());
    }

    #[test]
    fn test_flat_logical_chain_is_not_limited() {
        let any = format!("False{}", " or False".repeat(10_000));
        match parse(&any).unwrap() {
            Expr::Logical { operands, .. } => assert_eq!(operands.len(), 10_001),
            other => panic!("unexpected tree {other:?}"),
        }
    }
}
