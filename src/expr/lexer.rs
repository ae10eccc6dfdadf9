//! Tokenizer for rule expressions

use super::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Ident(String),
    True,
    False,
    And,
    Or,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    LParen,
    RParen,
    Comma,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Ident(name) => format!("name '{name}'"),
            TokenKind::True => "'True'".into(),
            TokenKind::False => "'False'".into(),
            TokenKind::And => "'and'".into(),
            TokenKind::Or => "'or'".into(),
            TokenKind::Plus => "'+'".into(),
            TokenKind::Minus => "'-'".into(),
            TokenKind::Star => "'*'".into(),
            TokenKind::Slash => "'/'".into(),
            TokenKind::Percent => "'%'".into(),
            TokenKind::Power => "'**'".into(),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::EqEq => "'=='".into(),
            TokenKind::NotEq => "'!='".into(),
            TokenKind::Lt => "'<'".into(),
            TokenKind::Le => "'<='".into(),
            TokenKind::Gt => "'>'".into(),
            TokenKind::Ge => "'>='".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Split `src` into tokens, ending with a single `Eof`.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            let (value, end) = lex_number(src, start)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position: start,
            });
            i = end;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let kind = match &src[start..i] {
                "True" => TokenKind::True,
                "False" => TokenKind::False,
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                word => TokenKind::Ident(word.to_string()),
            };
            tokens.push(Token {
                kind,
                position: start,
            });
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let (kind, width) = match (c, next) {
            (b'*', Some(b'*')) => (TokenKind::Power, 2),
            (b'=', Some(b'=')) => (TokenKind::EqEq, 2),
            (b'!', Some(b'=')) => (TokenKind::NotEq, 2),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'^', _) => (TokenKind::Power, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'=', _) => return Err(ExprError::syntax("assignment is not allowed", start)),
            (b'\'' | b'"', _) => {
                return Err(ExprError::syntax("string literals are not allowed", start))
            }
            (b'.', _) => return Err(ExprError::syntax("attribute access is not allowed", start)),
            (b'[' | b']', _) => return Err(ExprError::syntax("subscripts are not allowed", start)),
            (b';', _) => return Err(ExprError::syntax("statements are not allowed", start)),
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(ExprError::syntax(format!("unexpected character {ch:?}"), start));
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: src.len(),
    });
    Ok(tokens)
}

/// Decimal literal with optional fraction and exponent: `12`, `1.5`, `.5`,
/// `3.`, `1e-7`, `2.5E+3`.
fn lex_number(src: &str, start: usize) -> Result<(f64, usize), ExprError> {
    let bytes = src.as_bytes();
    let mut i = start;
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    i = digits(i);
    if bytes.get(i) == Some(&b'.') {
        i = digits(i + 1);
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(u8::is_ascii_digit) {
            i = digits(j);
        }
    }

    let text = &src[start..i];
    text.parse::<f64>()
        .map(|v| (v, i))
        .map_err(|_| ExprError::syntax(format!("invalid number literal '{text}'"), start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 .5 3. 1e-7 2E+3"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(3.0),
                TokenKind::Number(1e-7),
                TokenKind::Number(2000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_without_digits_leaves_name() {
        assert_eq!(
            kinds("2e"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::Ident("e".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            kinds("a**b ^ c <= d != e and True or False"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Power,
                TokenKind::Ident("b".into()),
                TokenKind::Power,
                TokenKind::Ident("c".into()),
                TokenKind::Le,
                TokenKind::Ident("d".into()),
                TokenKind::NotEq,
                TokenKind::Ident("e".into()),
                TokenKind::And,
                TokenKind::True,
                TokenKind::Or,
                TokenKind::False,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_rejected_characters() {
        for (src, pos) in [("x = 1", 2), ("'os'", 0), ("a.b", 1), ("1 # c", 2), ("[1]", 0)] {
            match tokenize(src) {
                Err(ExprError::Syntax { position, .. }) => assert_eq!(position, pos, "{src}"),
                other => panic!("expected syntax error for {src}, got {other:?}"),
            }
        }
    }
}
