//! Numeric expression parser
//!
//! Tokenizer plus recursive descent over a closed grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | '(' expr ')'
//! ```
//!
//! Input reaching this module has already had its variables substituted and
//! its decimal commas normalized, so identifiers are not part of the grammar.

use crate::ast::{BinOp, Expr, UnaryOp};
use orca_core::{Number, OrcaError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(s) => format!("'{}'", s),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, OrcaError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '0'..='9' | '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Number(input[start..end].to_string())
            }
            other => {
                return Err(OrcaError::invalid_expression(format!("unexpected character '{}'", other)))
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parse a fully numeric expression
pub fn parse_expr(input: &str, max_nesting: usize) -> Result<Expr, OrcaError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(OrcaError::invalid_expression("empty expression"));
    }

    let mut parser = Parser { tokens, pos: 0, depth: 0, max_nesting };
    let expr = parser.parse_additive()?;

    match parser.peek() {
        None => Ok(expr),
        Some(Token::RParen) => Err(OrcaError::invalid_expression("unbalanced parentheses")),
        Some(t) => Err(OrcaError::invalid_expression(format!("unexpected {}", t.describe()))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), OrcaError> {
        self.depth += 1;
        if self.depth > self.max_nesting {
            return Err(OrcaError::invalid_expression(format!(
                "nesting deeper than {} levels",
                self.max_nesting
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_additive(&mut self) -> Result<Expr, OrcaError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp(Box::new(left), op, Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, OrcaError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::BinaryOp(Box::new(left), op, Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, OrcaError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_unary()?;
            self.leave();
            return Ok(Expr::UnaryOp(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, OrcaError> {
        match self.next() {
            Some(Token::Number(text)) => Ok(Expr::Number(Number::from_str(&text)?)),
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_additive()?;
                self.leave();
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(OrcaError::invalid_expression("unbalanced parentheses")),
                }
            }
            Some(t) => Err(OrcaError::invalid_expression(format!("unexpected {}", t.describe()))),
            None => Err(OrcaError::invalid_expression("unexpected end of expression")),
        }
    }
}
